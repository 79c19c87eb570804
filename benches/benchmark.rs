//! パフォーマンスベンチマーク
//!
//! 生成したデータセットの書き込み・読み込みと、
//! ラージデータ退避を伴う書き込みの速度を測定します。

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::io::Cursor;
use xlsdata::{ColumnType, DataSet, DataValue, XlsReaderBuilder, XlsWriterBuilder};

/// `tables`個のテーブルに`rows`行ずつ持つデータセットを生成
fn generate_dataset(tables: usize, rows: usize, profile_length: usize) -> DataSet {
    let mut dataset = DataSet::new();
    for t in 0..tables {
        let table = dataset.add_table(format!("TABLE_{}", t));
        table.add_column("ID", ColumnType::Decimal).unwrap();
        table.add_column("NAME", ColumnType::String).unwrap();
        table.add_column("ACTIVE", ColumnType::Boolean).unwrap();
        table.add_column("PROFILE", ColumnType::String).unwrap();
        for r in 0..rows {
            let row = table.add_row();
            table.add_value(row, "ID", DataValue::Integer(r as i64)).unwrap();
            table
                .add_value(row, "NAME", DataValue::String(format!("name-{}", r)))
                .unwrap();
            table.add_value(row, "ACTIVE", DataValue::Boolean(r % 2 == 0)).unwrap();
            table
                .add_value(row, "PROFILE", DataValue::String("p".repeat(profile_length)))
                .unwrap();
        }
    }
    dataset
}

fn benchmark_write(c: &mut Criterion) {
    let dataset = generate_dataset(4, 1_000, 64);
    let writer = XlsWriterBuilder::new().build().unwrap();

    let mut group = c.benchmark_group("write");
    group.throughput(Throughput::Elements(4_000));
    group.sample_size(10);
    group.bench_function("write_4x1000_rows", |b| {
        b.iter(|| black_box(writer.write_to_buffer(black_box(&dataset)).unwrap()));
    });
    group.finish();
}

fn benchmark_read(c: &mut Criterion) {
    let dataset = generate_dataset(4, 1_000, 64);
    let bytes = XlsWriterBuilder::new()
        .build()
        .unwrap()
        .write_to_buffer(&dataset)
        .unwrap();
    let reader = XlsReaderBuilder::new().build().unwrap();

    let mut group = c.benchmark_group("read");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.sample_size(10);
    group.bench_function("read_4x1000_rows", |b| {
        b.iter(|| black_box(reader.read(Cursor::new(black_box(&bytes))).unwrap()));
    });
    group.finish();
}

fn benchmark_large_data(c: &mut Criterion) {
    let dataset = generate_dataset(1, 200, 5_000);
    let writer = XlsWriterBuilder::new()
        .cell_length_limit(1_000)
        .large_data_handling(true)
        .build()
        .unwrap();
    let bytes = writer.write_to_buffer(&dataset).unwrap();
    let reader = XlsReaderBuilder::new().build().unwrap();

    let mut group = c.benchmark_group("large_data");
    group.sample_size(10);
    group.bench_function("write_200_overflow_rows", |b| {
        b.iter(|| black_box(writer.write_to_buffer(black_box(&dataset)).unwrap()));
    });
    group.bench_function("read_200_overflow_rows", |b| {
        b.iter(|| black_box(reader.read(Cursor::new(black_box(&bytes))).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, benchmark_write, benchmark_read, benchmark_large_data);
criterion_main!(benches);

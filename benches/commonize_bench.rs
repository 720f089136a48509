//! Commonization Benchmark
//!
//! Runs the full pipeline on synthetic platform pairs of increasing size,
//! sequentially and with packages merged on the rayon pool.
//!
//! Every fifth package differs between the platforms so the comparator also
//! walks mismatching pairs, not just identical ones.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use klib_commonizer::{CommonizerOptions, DeclTree, commonize, io};
use serde_json::{Value, json};
use std::time::Duration;

/// One package with a small class hierarchy, a generic container and a
/// handful of functions and properties.
fn package(idx: usize, platform: &str) -> Value {
    let pkg = format!("platform.pkg{idx}");
    let size_type = if idx % 5 == 0 && platform == "macos" {
        "kotlin.Long"
    } else {
        "kotlin.Int"
    };
    json!({
        "name": pkg,
        "kind": "package",
        "members": [
            { "name": "Handle", "kind": "class", "class_kind": "interface", "members": [
                { "name": "close", "kind": "function", "modality": "abstract",
                  "return_type": { "classifier": "kotlin.Unit" } }
            ]},
            { "name": "File", "kind": "class", "modality": "open",
              "supertypes": [{ "classifier": format!("{pkg}.Handle") }],
              "constructors": [
                { "is_primary": true, "parameters": [
                    { "name": "path", "type": { "classifier": "kotlin.String" } }
                ]}
              ],
              "members": [
                { "name": "size", "kind": "property", "type": { "classifier": size_type } },
                { "name": "read", "kind": "function",
                  "return_type": { "classifier": "kotlin.ByteArray" }, "members": [
                    { "name": "count", "kind": "value", "type": { "classifier": "kotlin.Int" } }
                ]}
              ]},
            { "name": "Node", "kind": "class", "type_parameters": [
                { "name": "T", "upper_bounds": [{
                    "classifier": format!("{pkg}.Node"),
                    "arguments": [{ "projection": { "type": { "type_parameter": "T" } } }]
                }]}
            ]},
            { "name": "FileRef", "kind": "type_alias",
              "underlying": { "classifier": format!("{pkg}.File") } },
            { "name": "open", "kind": "function",
              "return_type": { "classifier": format!("{pkg}.FileRef"), "nullable": true },
              "members": [
                { "name": "path", "kind": "value", "type": { "classifier": "kotlin.String" } }
              ]},
            { "name": format!("kniBridge{idx}"), "kind": "function",
              "return_type": { "classifier": "kotlin.Unit" } }
        ]
    })
}

fn generate_tree(package_count: usize, platform: &str) -> DeclTree {
    let packages: Vec<Value> = (0..package_count)
        .map(|idx| package(idx, platform))
        .collect();
    let doc = json!({ "name": "platform", "kind": "module", "members": packages });
    io::parse_tree(&doc.to_string()).expect("generated tree is valid")
}

fn bench_commonize(c: &mut Criterion) {
    let mut group = c.benchmark_group("commonize");
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    for package_count in [10, 100, 500] {
        let first = generate_tree(package_count, "linux");
        let second = generate_tree(package_count, "macos");
        let label = format!("{package_count}pkgs_{}decls", first.len());

        for parallel in [false, true] {
            let options = CommonizerOptions {
                parallel,
                ..CommonizerOptions::default()
            };
            let name = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(
                BenchmarkId::new(name, &label),
                &(&first, &second),
                |b, (first, second)| {
                    b.iter(|| {
                        let output = commonize(first, second, &options).expect("commonize");
                        criterion::black_box(output.stats.total_common());
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_commonize);
criterion_main!(benches);

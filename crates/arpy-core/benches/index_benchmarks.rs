use criterion::{criterion_group, criterion_main, Criterion};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

fn entry_names(packages: usize, modules_per_package: usize) -> Vec<String> {
    let mut names = Vec::with_capacity(packages * (modules_per_package + 1));
    for p in 0..packages {
        names.push(format!("pkg_{p:03}/__init__.py"));
        for m in 0..modules_per_package {
            names.push(format!("pkg_{p:03}/sub/mod_{m:03}.py"));
        }
    }
    names
}

fn create_project(dir: &Path, modules: usize) -> PathBuf {
    let src = dir.join("proj");
    fs::create_dir_all(src.join("lib")).unwrap();
    let mut main = String::new();
    for i in 0..modules {
        fs::write(
            src.join("lib").join(format!("m{i:03}.py")),
            format!("VALUE = {i}\nLABEL = 'module ' + str(VALUE)\n"),
        )
        .unwrap();
        main.push_str(&format!("import lib.m{i:03}\n"));
    }
    fs::write(src.join("__main__.py"), main).unwrap();
    src
}

fn bench_index_from_entries(c: &mut Criterion) {
    let names = entry_names(50, 40);
    c.bench_function("index_from_2050_entries", |b| {
        b.iter(|| {
            arpy_core::ModuleIndex::from_entry_names(names.iter().map(String::as_str)).unwrap();
        });
    });
}

fn bench_build_archive(c: &mut Criterion) {
    c.bench_function("build_archive_100_modules", |b| {
        b.iter_with_setup(
            || {
                let dir = tempfile::tempdir().unwrap();
                let src = create_project(dir.path(), 100);
                let out = dir.path().join("out.arpy");
                (dir, src, out)
            },
            |(_dir, src, out)| {
                let options = arpy_core::BuildOptions {
                    output: Some(out),
                    ..arpy_core::BuildOptions::default()
                };
                arpy_core::build_archive(&src, &options).unwrap();
            },
        );
    });
}

fn bench_run_importing_archive(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let src = create_project(dir.path(), 100);
    let archive = dir.path().join("run.arpy");
    arpy_core::build_archive(
        &src,
        &arpy_core::BuildOptions {
            output: Some(archive.clone()),
            ..arpy_core::BuildOptions::default()
        },
    )
    .unwrap();

    c.bench_function("run_archive_100_imports", |b| {
        b.iter_with_setup(
            || arpy_core::Session::with_output(io::sink(), io::sink()),
            |mut session| {
                arpy_core::run(&mut session, &archive, &[]).unwrap();
            },
        );
    });
}

criterion_group!(
    benches,
    bench_index_from_entries,
    bench_build_archive,
    bench_run_importing_archive
);
criterion_main!(benches);

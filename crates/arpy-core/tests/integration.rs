//! Cross-crate behaviour: build a tree, then resolve and run it through a
//! session.

use arpy_core::{
    build_archive, info, run, ArchiveLoader, BuildOptions, CoreError, MemoryProvider, Session,
    SharedBuffer,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

fn build(dir: &Path, main: &str, files: &[(&str, &str)]) -> PathBuf {
    let src = dir.join("src");
    write_tree(&src, files);
    let out = dir.join("app.arpy");
    build_archive(
        &src,
        &BuildOptions {
            output: Some(out.clone()),
            main: Some(main.to_owned()),
            ..BuildOptions::default()
        },
    )
    .unwrap();
    out
}

fn capturing_session() -> (Session, SharedBuffer) {
    let out = SharedBuffer::new();
    (Session::with_output(out.clone(), io::sink()), out)
}

#[test]
fn end_to_end_build_list_run() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build(
        dir.path(),
        "app.__main__",
        &[
            (
                "app/__main__.py",
                "from app.util import ANSWER\nif ANSWER == 42:\n    print('ok')\n",
            ),
            ("app/util.py", "ANSWER = 42\n"),
        ],
    );

    let listing = info(&archive).unwrap();
    assert_eq!(listing.modules, vec!["app.__main__", "app.util"]);
    assert_eq!(listing.packages, vec!["app"]);

    let (mut session, out) = capturing_session();
    let status = run(&mut session, &archive, &[]).unwrap();
    assert_eq!(status, 0);
    assert_eq!(out.contents(), "ok\n");
}

#[test]
fn module_body_executes_once_per_session() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build(
        dir.path(),
        "main",
        &[
            ("main.py", "import counted\nimport counted\nfrom counted import X\n"),
            ("counted.py", "print('executed')\nX = 1\n"),
        ],
    );
    let (mut session, out) = capturing_session();
    run(&mut session, &archive, &[]).unwrap();
    assert_eq!(out.contents(), "executed\n");
}

#[test]
fn absent_entry_performs_no_execution() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build(
        dir.path(),
        "missing.entry",
        &[("missing/__init__.py", "print('package init ran')\n")],
    );
    let (mut session, out) = capturing_session();
    let err = run(&mut session, &archive, &[]).unwrap_err();
    assert!(matches!(err, CoreError::EntryNotFound { .. }));
    assert!(out.contents().is_empty());
}

#[test]
fn namespace_and_backed_packages_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build(
        dir.path(),
        "main",
        &[
            ("main.py", "import ns.tools.fmt as f\nimport pkg.sub\nprint(f.NAME, pkg.sub.NAME, pkg.INIT)\n"),
            ("ns/tools/fmt.py", "NAME = 'fmt'\n"),
            ("pkg/__init__.py", "INIT = 'init'\n"),
            ("pkg/sub.py", "NAME = 'sub'\n"),
        ],
    );
    let (mut session, out) = capturing_session();
    run(&mut session, &archive, &[]).unwrap();
    assert_eq!(out.contents(), "fmt sub init\n");

    let ns = session.module("ns").unwrap();
    assert!(ns.is_package());
    assert!(ns.origin().is_none());
    let pkg = session.module("pkg").unwrap();
    assert!(pkg.origin().unwrap().ends_with("#pkg/__init__.py"));
}

#[test]
fn relative_imports_inside_entry_package() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build(
        dir.path(),
        "app.__main__",
        &[
            ("app/__init__.py", "print('init')\n"),
            ("app/__main__.py", "from .helpers import greet\nprint(greet)\n"),
            ("app/helpers.py", "greet = 'hello'\n"),
        ],
    );
    let (mut session, out) = capturing_session();
    run(&mut session, &archive, &[]).unwrap();
    assert_eq!(out.contents(), "init\nhello\n");
}

#[test]
fn archive_shadows_earlier_providers() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build(dir.path(), "main", &[("shared.py", "print('from archive')\n")]);

    let (mut session, out) = capturing_session();
    session.install(Rc::new(
        MemoryProvider::new("fallback")
            .with_module("shared", "print('from memory')\n")
            .with_module("only_memory", "print('memory only')\n"),
    ));
    let mut guard = ArchiveLoader::activate(&mut session, &archive).unwrap();
    guard.import("shared").unwrap();
    guard.import("only_memory").unwrap();
    drop(guard);
    assert_eq!(out.contents(), "from archive\nmemory only\n");
}

#[test]
fn later_archive_wins_between_two_loaders() {
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();
    let first = build(first_dir.path(), "m", &[("m.py", "print('first')\n")]);
    let second = build(second_dir.path(), "m", &[("m.py", "print('second')\n")]);

    let (mut session, out) = capturing_session();
    let a = ArchiveLoader::open(&first).unwrap();
    let b = ArchiveLoader::open(&second).unwrap();
    a.install(&mut session);
    b.install(&mut session);
    session.import("m").unwrap();
    assert_eq!(out.contents(), "second\n");
    b.close(&mut session);
    a.close(&mut session);
    assert!(session.provider_labels().is_empty());
}

#[test]
fn nested_sys_exit_ends_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build(
        dir.path(),
        "main",
        &[
            ("main.py", "import quitter\nprint('unreachable')\n"),
            ("quitter.py", "import sys\nsys.exit(5)\n"),
        ],
    );
    let (mut session, out) = capturing_session();
    assert_eq!(run(&mut session, &archive, &[]).unwrap(), 5);
    assert!(out.contents().is_empty());
}

#[test]
fn import_of_unknown_module_reports_import_error() {
    let dir = tempfile::tempdir().unwrap();
    let archive = build(dir.path(), "main", &[("main.py", "import does.not.exist\n")]);
    let (mut session, _) = capturing_session();
    let err = run(&mut session, &archive, &[]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("ImportError"), "{msg}");
    assert!(msg.contains("does"), "{msg}");
}

#[test]
fn archive_without_manifest_uses_defaults() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("bare.arpy");
    let file = fs::File::create(&archive).unwrap();
    let mut ar = tar::Builder::new(GzEncoder::new(file, Compression::fast()));
    let body = b"print('bare')\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(body.len() as u64);
    header.set_mode(0o644);
    ar.append_data(&mut header, "__main__.py", &body[..]).unwrap();
    ar.into_inner().unwrap().finish().unwrap();

    let listing = info(&archive).unwrap();
    assert_eq!(listing.manifest.name, "unnamed");

    let (mut session, out) = capturing_session();
    assert_eq!(run(&mut session, &archive, &[]).unwrap(), 0);
    assert_eq!(out.contents(), "bare\n");
}

use std::fs;
use std::time::Duration;
use tempfile::TempDir;

use binary_checker::scanner::target::ScanTarget;
use binary_checker::scanner::walker::{TreeWalker, WalkerConfig};

#[test]
#[cfg(unix)]
fn repro_symlink_loop_terminates() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("scan_root");
    fs::create_dir(&root).unwrap();

    // Create a symlink loop: root/loop -> root
    std::os::unix::fs::symlink(&root, root.join("loop")).unwrap();
    let deep = root.join("a/b/c");
    fs::create_dir_all(&deep).unwrap();
    fs::write(deep.join("notes.txt"), b"plain\n").unwrap();

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let target = ScanTarget::local(&root).unwrap();
        let walker = TreeWalker::new(WalkerConfig {
            parallelism: 2,
            ..WalkerConfig::default()
        });
        tx.send(walker.scan(&target).map(|r| r.stats.files_seen))
            .unwrap();
    });

    // If it takes more than 5 seconds, it's likely stuck in the loop.
    match rx.recv_timeout(Duration::from_secs(5)) {
        Ok(Ok(seen)) => assert_eq!(seen, 1, "only the real file should be seen"),
        Ok(Err(e)) => panic!("scan failed: {e}"),
        Err(_) => panic!("scan timed out - likely stuck in symlink loop"),
    }
}

fn main() {
    println!("cargo:rustc-env=BRIDGE_BUILD_TIME={}", build_timestamp());
}

/// UTC build timestamp. Shells out to `date` to keep the build script
/// dependency-free.
fn build_timestamp() -> String {
    use std::process::Command;
    let output = Command::new("date")
        .args(["-u", "+%Y-%m-%dT%H:%M:%SZ"])
        .output()
        .expect("failed to run `date`");
    String::from_utf8(output.stdout)
        .expect("non-UTF-8 output from `date`")
        .trim()
        .to_string()
}

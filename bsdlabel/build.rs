use std::env;

fn main() {
    let path = env::var("BOOTDIR").unwrap_or(String::from("/usr/ucb/mdec"));

    println!("cargo:rustc-env=BOOTDIR={path}");
}

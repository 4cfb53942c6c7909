// Cargo build-script variables surfaced by `cmdclient version --extended`.
const FORWARDED: [(&str, &str); 2] = [
    ("TARGET", "CMDCLIENT_BUILD_TARGET"),
    ("PROFILE", "CMDCLIENT_BUILD_PROFILE"),
];

fn main() {
    for (source, exported) in FORWARDED {
        println!("cargo:rerun-if-env-changed={source}");
        if let Ok(value) = std::env::var(source) {
            println!("cargo:rustc-env={exported}={value}");
        }
    }
}

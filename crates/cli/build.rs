use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("clipmark")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Clipmark Contributors")
        .about("Save web pages as Markdown with an images folder")
        .arg(clap::arg!(<INPUT> "URL to fetch, local HTML file, or '-' for stdin"))
        .arg(
            clap::arg!(-o --output <DIR> "Directory to write <title>.md and images/ into")
                .value_name("DIR")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            clap::arg!(-f --format <FORMAT> "Output format for stdout (markdown, json)")
                .value_name("FORMAT")
                .default_value("markdown")
                .value_parser(["markdown", "json"]),
        )
        .arg(clap::arg!(--url <URL> "Page URL used to resolve relative links and images"))
        .arg(clap::arg!(--snapshot "Treat INPUT as a JSON document snapshot instead of HTML"))
        .arg(clap::arg!(--no_frontmatter "Start with a \"# Title\" heading instead of frontmatter"))
        .arg(
            clap::arg!(-t --tag <TAG> "Frontmatter tag (repeatable)")
                .action(clap::ArgAction::Append),
        )
        .arg(
            clap::arg!(--settings <FILE> "Settings file")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--save_settings "Write the effective settings back to the settings file"))
        .arg(clap::arg!(--no_download "Write the Markdown only, without saving images"))
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds").default_value("30"))
        .arg(clap::arg!(--user_agent <UA> "Custom User-Agent for HTTP requests").value_name("UA"))
        .arg(clap::arg!(-v --verbose "Enable debug logging"));

    for shell in [
        clap_complete::Shell::Bash,
        clap_complete::Shell::Zsh,
        clap_complete::Shell::Fish,
        clap_complete::Shell::PowerShell,
    ] {
        clap_complete::generate_to(shell, &mut cmd, "clipmark", &completions_dir).unwrap();
    }

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}

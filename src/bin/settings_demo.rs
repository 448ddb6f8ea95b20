use authgate::settings::*;

fn main() -> anyhow::Result<()> {
    // $ cargo run --bin settings_demo -- --settings=settings/release.toml
    // $ AUTHGATE__LOCKOUT__THRESHOLD=3 cargo run --bin settings_demo
    let cli = Cli::parse();
    let settings = parse_settings(cli.settings.as_deref())?;
    println!("Loaded settings: {:#?}", settings);

    println!(
        "Error on invalid path: {:?}",
        parse_settings(Some("")).is_err()
    );
    Ok(())
}

use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let sample_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("samples")
        .join("sample-config.yml");
    let config_content = fs::read_to_string(&sample_path)
        .map_err(|e| format!("Failed to read sample config: {}", e))?;

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = if let Some(home_dir) = dirs::home_dir() {
        home_dir.join(".config/geoprobe/config.yml")
    } else {
        PathBuf::from("/etc/geoprobe/config.yml")
    };

    if config_path.exists() {
        eprintln!(
            "Error: Config file already exists at {}",
            config_path.display()
        );
        eprintln!("Remove it first or use --stdout to print the config");
        std::process::exit(1);
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());

    match crate::config::load_config(&path) {
        Ok(_) => {
            println!("Config is valid");
            Ok(())
        }
        Err(e) => {
            eprintln!("Config validation failed:\n{}", e);
            std::process::exit(1);
        }
    }
}

//! forge – command-line report generator.
//!
//! Usage:
//!   forge <template> [data.json] [-o out.pdf] [--templates DIR]
//!         [--landscape|--portrait] [--size A4|letter|legal|A3|A5]
//!         [--config engine.json]
//!
//! If `-o` is omitted the PDF is written to the current directory with the
//! template's stem (e.g. `invoice.html` → `invoice.pdf`).

use std::{env, fs, path::Path, path::PathBuf, process};

use report_forge::{DataModel, EngineConfig, PageOrientation, PageSize, ReportEngine};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("forge");

    let mut template: Option<String> = None;
    let mut data_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut template_root: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut orientation: Option<PageOrientation> = None;
    let mut page_size: Option<PageSize> = None;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| match iter.next() {
            Some(v) => v.clone(),
            None => fail(prog, &format!("{flag} needs a value")),
        };
        match arg.as_str() {
            "--output" | "-o" => output_path = Some(PathBuf::from(value(arg.as_str()))),
            "--templates" | "-t" => template_root = Some(PathBuf::from(value(arg.as_str()))),
            "--config" | "-c" => config_path = Some(PathBuf::from(value(arg.as_str()))),
            "--size" | "-s" => {
                let v = value(arg.as_str());
                match v.parse::<PageSize>() {
                    Ok(size) => page_size = Some(size),
                    Err(e) => fail(prog, &e.to_string()),
                }
            }
            "--landscape" | "-l" => orientation = Some(PageOrientation::Landscape),
            "--portrait" | "-p" => orientation = Some(PageOrientation::Portrait),
            "--help" | "-h" => {
                print_usage(prog);
                process::exit(0);
            }
            other if other.starts_with('-') => fail(prog, &format!("Unknown flag: {other}")),
            path => {
                match positional {
                    0 => template = Some(path.to_string()),
                    1 => data_path = Some(PathBuf::from(path)),
                    _ => fail(prog, &format!("Unexpected argument: {path}")),
                }
                positional += 1;
            }
        }
    }

    let Some(template) = template else {
        fail(prog, "no template specified.");
    };

    let mut config = match &config_path {
        Some(path) => EngineConfig::from_file(path).unwrap_or_else(|e| exit_with(&e)),
        None => EngineConfig::default(),
    };
    if let Some(root) = template_root {
        config.template_root = root;
    }

    let data = match &data_path {
        Some(path) => read_data(path),
        None => DataModel::new(),
    };

    let output = output_path.unwrap_or_else(|| {
        let stem = Path::new(&template)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("report");
        PathBuf::from(format!("{stem}.pdf"))
    });
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent) {
            exit_with(&format!("Error creating output directory: {e}"));
        }
    }

    let engine = ReportEngine::new(config);
    let mut builder = engine.builder().with_template(&template).extend_data(data);
    if let Some(size) = page_size {
        builder = builder.with_page_size(size);
    }
    if let Some(o) = orientation {
        builder = builder.with_orientation(o);
    }

    match builder.generate_to_file(&output) {
        Ok(()) => {
            let bytes = fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
            eprintln!("Wrote '{}' ({bytes} bytes)", output.display());
        }
        Err(e) => exit_with(&e),
    }
}

fn read_data(path: &Path) -> DataModel {
    let json = fs::read_to_string(path)
        .unwrap_or_else(|e| exit_with(&format!("Error reading '{}': {e}", path.display())));
    match serde_json::from_str::<serde_json::Value>(&json) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => exit_with(&format!("'{}' must contain a JSON object", path.display())),
        Err(e) => exit_with(&format!("Error parsing '{}': {e}", path.display())),
    }
}

fn exit_with(message: &dyn std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    process::exit(1);
}

fn fail(prog: &str, message: &str) -> ! {
    eprintln!("Error: {message}");
    print_usage(prog);
    process::exit(1);
}

fn print_usage(prog: &str) {
    eprintln!("forge – data-driven PDF reports (report-forge)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <template> [data.json] [-o out.pdf] [--templates DIR] [--landscape|--portrait] [--size SIZE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <template>       Template path relative to the template root");
    eprintln!("  [data.json]      JSON object used as the data model (default: empty)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --output, -o     Output path (default: template stem with .pdf)");
    eprintln!("  --templates, -t  Template root directory (default: templates)");
    eprintln!("  --config, -c     Engine configuration JSON");
    eprintln!("  --size, -s       A4, letter, legal, A3 or A5 (sets pageSize)");
    eprintln!("  --landscape      Sets pageOrientation to landscape");
    eprintln!("  --portrait       Sets pageOrientation to portrait");
    eprintln!("  --help           Print this message");
    eprintln!();
    eprintln!("Set RUST_LOG=debug for pipeline diagnostics.");
}

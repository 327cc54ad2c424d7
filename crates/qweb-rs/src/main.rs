//! qweb-rs - render QWeb template bundles from the command line.

use clap::Parser;
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use qweb_runtime::{QWeb, Value};
use std::process::ExitCode;

mod cli;

use cli::{Args, OutputFormat};

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    // Set up miette for nice error output
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let bundle = std::fs::read_to_string(&args.bundle)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading bundle {}", args.bundle.display()))?;

    let mut qweb = QWeb::new();
    qweb.load_templates(&bundle)
        .into_diagnostic()
        .wrap_err("loading templates")?;

    if args.list {
        for name in qweb.templates().keys() {
            println!("{}", name);
        }
        return Ok(());
    }

    let template = args
        .template
        .as_deref()
        .ok_or_else(|| miette!("--template is required unless --list is given"))?;

    let context = match &args.context {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("reading context {}", path.display()))?;
            let json: serde_json::Value = serde_json::from_str(&raw)
                .into_diagnostic()
                .wrap_err("parsing context JSON")?;
            Value::from(json)
        }
        None => Value::Null,
    };

    if args.verbose {
        if let Some(compiled) = qweb.template(template) {
            eprintln!("{}", compiled.program.dump());
        }
    }

    let html = qweb
        .render_to_string(template, &context)
        .into_diagnostic()
        .wrap_err_with(|| format!("rendering template '{}'", template))?;

    match args.output {
        OutputFormat::Html => println!("{}", html),
        OutputFormat::Json => {
            let json = serde_json::json!({
                "template": template,
                "html": html,
            });
            println!("{}", json);
        }
    }
    Ok(())
}

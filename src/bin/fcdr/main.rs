use std::process::ExitCode;

use clap::Parser;
use error_stack::ResultExt;
use fcdr_rs::config::WriterConfig;
use fcdr_rs::dataset::Dataset;
use fcdr_rs::logging::init_logging;
use fcdr_rs::writer::FcdrWriter;

use crate::errors::CliError;

mod cli;
mod errors;
mod inspect;

fn main() -> ExitCode {
    let clargs = cli::Cli::parse();
    init_logging(clargs.verbosity.log_level_filter());

    match driver(clargs) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e.current_context());
            eprintln!("\nfcdr failed:\n\n{e:?}\n");
            ExitCode::FAILURE
        }
    }
}

fn driver(clargs: cli::Cli) -> error_stack::Result<(), CliError> {
    match clargs.command {
        cli::Commands::Easy(easy_cli) => easy_driver(easy_cli),
        cli::Commands::Full(full_cli) => full_driver(full_cli),
        cli::Commands::Inspect(inspect_cli) => inspect::inspect(inspect_cli),
        cli::Commands::ConfigTemplate(template_cli) => {
            WriterConfig::write_template_example(&template_cli.template_file)
                .map_err(|e| {
                    let new_context = CliError::from_config_error(e.current_context());
                    e.change_context(new_context)
                })?;
            log::info!("Wrote example configuration to {}", template_cli.template_file.display());
            Ok(())
        }
    }
}

fn easy_driver(cli: cli::EasyCli) -> error_stack::Result<(), CliError> {
    let config = load_config(&cli.product)?;
    let product = &cli.product;
    let ds = FcdrWriter::create_template_easy(
        product.sensor,
        product.height,
        cli.srf_size,
        cli.corr_dx,
        cli.corr_dy,
        cli.lut_size,
    )
    .change_context_lazy(|| CliError::internal_error(format!("could not build the easy {} template", product.sensor)))?;
    write_product(ds, product, &config)
}

fn full_driver(cli: cli::FullCli) -> error_stack::Result<(), CliError> {
    let config = load_config(&cli.product)?;
    let product = &cli.product;
    let ds = FcdrWriter::create_template_full(product.sensor, product.height)
        .change_context_lazy(|| CliError::internal_error(format!("could not build the full {} template", product.sensor)))?;
    write_product(ds, product, &config)
}

fn load_config(product: &cli::ProductCli) -> error_stack::Result<WriterConfig, CliError> {
    WriterConfig::load(product.config.as_deref()).map_err(|e| {
        let context = CliError::from_config_error(&e);
        error_stack::Report::new(e).change_context(context)
    })
}

fn write_product(mut ds: Dataset, product: &cli::ProductCli, config: &WriterConfig) -> error_stack::Result<(), CliError> {
    config.apply_global_attributes(&mut ds);
    if ds.attr("history").and_then(|h| h.as_str()).map_or(true, |h| h.is_empty()) {
        let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        ds.set_attr("history", format!("{now}: created by fcdr {}", env!("CARGO_PKG_VERSION")));
    }

    let overwrite = product.overwrite || config.overwrite;
    config.writer().write_dataset(&ds, &product.output, overwrite).map_err(|e| {
        let new_context = CliError::from_write_error(e.current_context());
        e.change_context(new_context)
    })?;
    log::info!("Wrote {} {} variables to {}", ds.len(), product.sensor, product.output.display());
    Ok(())
}

use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = askql_api::Args::parse();

	askql_api::run(args).await
}

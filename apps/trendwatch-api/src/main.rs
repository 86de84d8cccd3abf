use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = trendwatch_api::Args::parse();

	trendwatch_api::run(args).await
}

use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = trendwatch_worker::Args::parse();

	trendwatch_worker::run(args).await
}

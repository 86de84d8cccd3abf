use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = trendwatch_history::Args::parse();

	trendwatch_history::run(args).await
}

use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = perch_api::Args::parse();
	perch_api::run(args).await
}

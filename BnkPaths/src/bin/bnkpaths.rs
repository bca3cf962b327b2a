fn main() -> anyhow::Result<()> {
    bnkpaths::cli::run_cli()
}

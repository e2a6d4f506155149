use anyhow::Result;
use folio_cli::app;

fn main() -> Result<()> {
    app::run()
}

use anyhow::Result;

fn main() -> Result<()> {
    static_mapping::cli::run()
}

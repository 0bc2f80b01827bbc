fn main() -> Result<(), anyhow::Error> {
    nmbatch::run()
}

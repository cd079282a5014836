fn main() -> anyhow::Result<()> {
    flowguard::run()
}

fn main() {
    coreshots_lib::run()
}

fn main() {
    slice_density::cli::run();
}

fn main() {
    uniffi::generate_scaffolding("src/divelog.udl").unwrap();
}

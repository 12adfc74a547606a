fn main() {
    // Only the ESP-IDF build needs the sysenv forwarded; host test builds
    // run without embuild.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}

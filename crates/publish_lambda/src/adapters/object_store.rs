pub trait ArchiveStore {
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String>;
}

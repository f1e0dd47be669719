#[cfg(test)]
pub mod test {
    use crate::store::MemoryStore;

    /// A small three-layer store for the `prod` environment and `api`
    /// deployment.
    pub fn seeded_store() -> MemoryStore {
        [
            ("prod/common/a.x", "1"),
            ("prod/common/db.host", " h1\n"),
            ("prod/common/db.port", "5432"),
            ("prod/common/replicas", "2"),
            ("prod/common/secret.password", "1234"),
            ("prod/deployment/api/a.y", "2"),
            ("prod/deployment/api/replicas", "4"),
            ("prod/deployment/worker/replicas", "9"),
            ("prod/provisioning/a.x", "3"),
            ("prod/provisioning/region", "eu-west-1"),
            ("staging/common/db.host", "s1"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn seeded_store_has_every_layer() {
        use crate::store::KeyValueStore;

        let store = seeded_store();
        assert_eq!(store.list("prod/common/").unwrap().len(), 5);
        assert_eq!(store.list("prod/deployment/api/").unwrap().len(), 2);
        assert_eq!(store.list("prod/provisioning/").unwrap().len(), 2);
    }
}

//! Unit tests for the mock provider store.

use rstest::{fixture, rstest};

use super::*;
use crate::api::payload::{CreateVmPayload, DiskPayload, HostingLocationPayload};

#[fixture]
fn store() -> MockStore {
    MockStore::new(MockSettings::new("key", "ops@example.com").with_listing_delay(1))
}

#[fixture]
fn payload() -> CreateVmPayload {
    CreateVmPayload {
        client_id: 123,
        name: "test-vm-2".to_owned(),
        template: Some("template-123".to_owned()),
        guest_os_id: "os-123".to_owned(),
        cores: 4,
        memory_size: 8,
        operating_system_disk: DiskPayload {
            capacity: None,
            storage_profile: "vStorageT1".to_owned(),
        },
        additional_disks: Vec::new(),
        iso_file: None,
        quote_item: std::collections::BTreeMap::new(),
        hosting_location: HostingLocationPayload {
            id: "vcchcres".to_owned(),
            name: "Christchurch".to_owned(),
            default_network: "net-1".to_owned(),
        },
        backup_type: "vBackupNone".to_owned(),
    }
}

#[rstest]
fn new_machine_is_hidden_for_the_listing_delay(store: MockStore, payload: CreateVmPayload) {
    let id = store
        .create_vm(&payload)
        .unwrap_or_else(|err| panic!("create: {err}"));

    assert_eq!(id, 12345);
    assert!(store.list_vms(123).is_empty());
    let visible = store.list_vms(123);
    assert_eq!(visible.len(), 1);
    assert_eq!(store.listing_calls(), 2);
    assert_eq!(store.mo_ref_of(id).as_deref(), Some("vm-12345"));
}

#[rstest]
#[case::blank_name(|p: &mut CreateVmPayload| p.name = " ".to_owned())]
#[case::zero_cores(|p: &mut CreateVmPayload| p.cores = 0)]
#[case::template_and_capacity(|p: &mut CreateVmPayload| p.operating_system_disk.capacity = Some(40))]
#[case::neither(|p: &mut CreateVmPayload| p.template = None)]
fn incomplete_requests_are_rejected(
    store: MockStore,
    mut payload: CreateVmPayload,
    #[case] mutate: fn(&mut CreateVmPayload),
) {
    mutate(&mut payload);
    assert_eq!(store.create_vm(&payload), Err(MockError::MissingFields));
    assert_eq!(store.vm_count(), 0);
}

#[rstest]
fn detail_reports_backend_tiers_and_float_capacity(store: MockStore, payload: CreateVmPayload) {
    let id = store
        .create_vm(&payload)
        .unwrap_or_else(|err| panic!("create: {err}"));

    let detail = store
        .vm_detail(&id.to_string())
        .unwrap_or_else(|err| panic!("detail: {err}"));
    let disks = detail.specification.virtual_disks.unwrap_or_default();

    assert_eq!(disks.len(), 1);
    assert_eq!(disks.first().and_then(|d| d.tier.as_deref()), Some("Performance"));
    assert_eq!(disks.first().map(|d| d.capacity), Some(40.0));
    assert_eq!(store.detail_calls(), 1);
}

#[rstest]
fn delete_requires_power_off_and_matching_token(store: MockStore, payload: CreateVmPayload) {
    let id = store
        .create_vm(&payload)
        .unwrap_or_else(|err| panic!("create: {err}"))
        .to_string();

    assert_eq!(
        store.delete_vm(&id, "vm-12345"),
        Err(MockError::NotPoweredOff(id.clone()))
    );
    store
        .power_off(&id)
        .unwrap_or_else(|err| panic!("power off: {err}"));
    assert_eq!(
        store.delete_vm(&id, "vm-99999"),
        Err(MockError::CheckTokenMismatch(id.clone()))
    );
    store
        .delete_vm(&id, "vm-12345")
        .unwrap_or_else(|err| panic!("delete: {err}"));
    assert_eq!(
        store.delete_vm(&id, "vm-12345"),
        Err(MockError::VmNotFound(id.clone()))
    );
}

#[rstest]
fn added_disk_is_hidden_for_the_disk_delay(payload: CreateVmPayload) {
    let store = MockStore::new(MockSettings::new("key", "ops@example.com").with_disk_delay(1));
    let id = store
        .create_vm(&payload)
        .unwrap_or_else(|err| panic!("create: {err}"))
        .to_string();
    let disk_count = |store: &MockStore| {
        store
            .vm_detail(&id)
            .map(|detail| detail.specification.virtual_disks.unwrap_or_default().len())
            .unwrap_or_else(|err| panic!("detail: {err}"))
    };

    store
        .add_disk(&id, "vStorageT2", 500)
        .unwrap_or_else(|err| panic!("add disk: {err}"));

    assert_eq!(disk_count(&store), 1);
    assert_eq!(disk_count(&store), 2);
}

#[rstest]
fn buckets_are_listed_per_tenant(store: MockStore) {
    store
        .create_bucket(7, "user-1", "backups")
        .unwrap_or_else(|err| panic!("create bucket: {err}"));
    assert_eq!(
        store.create_bucket(7, "user-2", "backups"),
        Err(MockError::BucketExists("backups".to_owned()))
    );

    let detail = store.object_storage(7);
    let names: Vec<_> = detail
        .users
        .iter()
        .flat_map(|user| user.buckets.iter().map(|b| b.bucket_name.as_str()))
        .collect();
    assert_eq!(names, vec!["backups"]);
    assert!(store.object_storage(8).users.is_empty());

    store
        .delete_bucket(7, "user-1", "backups")
        .unwrap_or_else(|err| panic!("delete bucket: {err}"));
    assert_eq!(
        store.delete_bucket(7, "user-1", "backups"),
        Err(MockError::BucketNotFound("backups".to_owned()))
    );
}

#[test]
fn credentials_must_match_exactly() {
    let store = MockStore::new(MockSettings::new("key", "ops@example.com"));
    assert!(store.authorizes(Some("Bearer key"), Some("ops@example.com")));
    assert!(!store.authorizes(Some("apiKey key"), Some("ops@example.com")));
    assert!(!store.authorizes(Some("Bearer key"), None));
}

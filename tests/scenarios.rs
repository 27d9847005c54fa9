use std::sync::Arc;

use pscatter::{
    parse_args, AddressClass, EntryKind, LeasePool, MockBackend, ReadMap, ScatterFlags,
    ScatterHandle, ScatterMap, TargetId, WriteGate,
};

fn fresh_handle(backend: &MockBackend) -> ScatterHandle<pscatter::MockResource> {
    ScatterHandle::initialize(backend, TargetId::PHYSICAL, ScatterFlags::NONE, LeasePool::new()).unwrap()
}

#[test]
fn single_page_value_read_scenario() {
    let backend = MockBackend::new();
    backend.seed(0x401000, &0xdead_beefu32.to_le_bytes());
    let h = fresh_handle(&backend);
    h.prepare_read_value::<u32>(0x401000);
    h.execute().unwrap();
    assert_eq!(h.read_value::<u32>(0x401000), Some(0xdead_beef));
}

#[test]
fn cross_page_array_read_scenario() {
    let backend = MockBackend::new();
    let addr = 0x1ffcu64;
    let mut data = Vec::new();
    for i in 0u32..16 {
        data.extend_from_slice(&i.to_le_bytes());
    }
    backend.seed(addr, &data);
    let h = fresh_handle(&backend);
    h.prepare_read_array::<u32>(addr, 16);
    h.execute().unwrap();
    let lease = h.read_array::<u32>(addr, 16).unwrap();
    assert_eq!(&lease[..4], &[0, 1, 2, 3]);
}

#[test]
fn dependent_rounds_via_scatter_map_scenario() {
    let backend = Arc::new(MockBackend::new());
    backend.seed(0x1000, &0x9000u64.to_le_bytes());
    backend.seed(0x9000, &123u32.to_le_bytes());

    let map = ScatterMap::<pscatter::MockResource>::new(
        backend,
        TargetId::PHYSICAL,
        LeasePool::new(),
    );
    let round0 = map.add_round(ScatterFlags::NONE).unwrap();
    let round1 = map.add_round(ScatterFlags::NONE).unwrap();
    round0.prepare_read_ptr(0x1000);

    let round1_cb = round1.clone();
    round0.register_completed(move |h| {
        if let Some(ptr) = h.read_ptr(0x1000) {
            round1_cb.prepare_read_value::<u32>(ptr);
        }
    });

    map.execute().unwrap();

    assert_eq!(round1.read_value::<u32>(0x9000), Some(123));
}

#[test]
fn write_disabled_scenario() {
    let backend = MockBackend::new();
    let h = fresh_handle(&backend);
    // Global gate state may have been left disabled by another test in this
    // binary; force it back to the default before asserting.
    WriteGate::global().set_enabled(true);
    assert!(h.prepare_write_value(0x1000, 5u32));

    let _cli = parse_args(["--read-only"].into_iter().map(String::from));
    assert!(!WriteGate::global().is_enabled());
    assert!(!h.prepare_write_value(0x1000, 5u32));
    WriteGate::global().set_enabled(true);
}

#[test]
fn execute_on_empty_handle_scenario() {
    let backend = MockBackend::new();
    let h = fresh_handle(&backend);
    h.execute().unwrap();
    assert_eq!(h.read_value::<u32>(0x1000), None);
}

#[test]
fn tiny_read_upgrade_scenario() {
    let backend = MockBackend::new();
    let mut page = vec![0u8; 0x1000];
    page[0xf00..0xf04].copy_from_slice(&55u32.to_le_bytes());
    backend.seed(0x3000, &page);
    let h = fresh_handle(&backend);

    h.prepare_read_value::<u32>(0x3000); // tiny window near the start of the page
    h.prepare_read_value::<u32>(0x3f00); // forces upgrade to a full-page fetch
    h.execute().unwrap();

    assert_eq!(h.read_value::<u32>(0x3f00), Some(55));
}

#[test]
fn read_map_end_to_end_scenario() {
    let backend = Arc::new(MockBackend::new());
    backend.seed(0x2000, &7u64.to_le_bytes());
    let map = ReadMap::<pscatter::MockResource>::new(backend, TargetId::PHYSICAL, LeasePool::new());
    let round = map.add_round(ScatterFlags::NONE).unwrap();
    let index = map.add_index(round);
    let entry = map.add_entry(round, index, 0x2000, EntryKind::pointer());
    map.execute().unwrap();
    assert_eq!(entry.get_pointer(AddressClass::Physical), Some(7));
}

#[test]
fn read_map_dependent_round_scenario() {
    let backend = Arc::new(MockBackend::new());
    backend.seed(0x4000, &0x6000u64.to_le_bytes());
    backend.seed(0x6000, &0xabcdu32.to_le_bytes());

    let map = ReadMap::<pscatter::MockResource>::new(backend, TargetId::PHYSICAL, LeasePool::new());
    let round0 = map.add_round(ScatterFlags::NONE).unwrap();
    let idx0 = map.add_index(round0);
    let ptr_entry = map.add_entry(round0, idx0, 0x4000, EntryKind::pointer());

    let round1 = map.add_round(ScatterFlags::NONE).unwrap();

    let ptr_entry_for_cb = ptr_entry.clone();
    map.register_index_completed(round0, idx0, move |m| {
        if let Some(addr) = ptr_entry_for_cb.get_pointer(AddressClass::Physical) {
            let idx1 = m.add_index(round1);
            m.add_entry(round1, idx1, addr, EntryKind::value::<u32>());
        }
    });

    map.execute().unwrap();

    assert_eq!(map.round_handle(round1).read_value::<u32>(0x6000), Some(0xabcd));
}

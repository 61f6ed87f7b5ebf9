//! PDU Session integration tests
//!
//! Tests PDU session setup, modification and release against recording
//! collaborators.

use std::net::SocketAddr;

use integration_tests::init_test_logging;
use integration_tests::test_fixtures::{
    drb, drb_item, psi, qfi, session_item, TEST_F1U_ADDR, TEST_N3_ADDR, TEST_UPF_ADDR,
};
use integration_tests::TestHarness;
use nextgsim_common::{Cause, GtpTeid, UeIndex, UpTransportLayerInfo};
use nextgsim_cu_up::interfaces::{PdcpRxUpperControlNotifier, PdcpTxUpperControlNotifier};
use nextgsim_cu_up::{
    allocate_bearer_teid, allocate_session_teid, DrbToModifyItem, PduSessionToModifyItem,
};

fn dl_tunnel(teid: u32) -> UpTransportLayerInfo {
    UpTransportLayerInfo::new(TEST_F1U_ADDR, GtpTeid(teid))
}

#[test]
fn test_setup_reference_scenario() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(7);

    let result = manager.setup_pdu_session(&session_item(3).with_drb(drb_item(5, &[9])));

    assert!(result.success);
    assert_eq!(result.pdu_session_id, psi(3));
    assert_eq!(result.cause, None);
    assert_eq!(
        result.gtp_tunnel,
        Some(UpTransportLayerInfo::new(TEST_N3_ADDR, GtpTeid(1795)))
    );

    assert_eq!(result.drb_setup_results.len(), 1);
    let drb_result = &result.drb_setup_results[0];
    assert!(drb_result.success);
    assert_eq!(drb_result.drb_id, drb(5));
    assert_eq!(
        drb_result.gtp_tunnel,
        Some(UpTransportLayerInfo::new(TEST_F1U_ADDR, GtpTeid(459781)))
    );
    assert_eq!(drb_result.qos_flow_results.len(), 1);
    assert!(drb_result.qos_flow_results[0].success);
    assert_eq!(drb_result.qos_flow_results[0].qos_flow_id, qfi(9));

    assert!(harness.demux.has_tunnel(GtpTeid(1795)));
    assert_eq!(
        harness.f1u_gw.created(),
        vec![(UeIndex(7), GtpTeid(459781))]
    );
    assert_eq!(harness.factory.pdcp_created(), vec![(UeIndex(7), drb(5))]);
    assert_eq!(
        harness.factory.sdap_mapping(UeIndex(7), psi(3)),
        vec![(qfi(9), drb(5))]
    );

    let ngu = harness.factory.ngu_configs();
    assert_eq!(ngu.len(), 1);
    assert_eq!(ngu[0].0, UeIndex(7));
    assert_eq!(ngu[0].1.local_teid, GtpTeid(1795));
    assert_eq!(ngu[0].1.peer_teid, GtpTeid(0x1003));
    assert_eq!(ngu[0].1.peer_addr, SocketAddr::new(TEST_UPF_ADDR, 2152));

    let session = manager.pdu_session(psi(3)).expect("session published");
    assert!(session.is_tunnel_registered());
    assert_eq!(session.local_teid(), GtpTeid(1795));
    assert_eq!(session.drb_ids(), vec![drb(5)]);
    assert!(session.adapters().sdap_to_gtpu.is_connected());
    assert!(session.adapters().gtpu_to_sdap.is_connected());
}

#[test]
fn test_session_teids_unique_per_ue() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(2);

    let mut teids = Vec::new();
    for id in 1..=4 {
        let result = manager.setup_pdu_session(&session_item(id));
        assert!(result.success);
        teids.push(result.gtp_tunnel.expect("tunnel").teid);
    }

    let mut unique = teids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), teids.len());
    assert_eq!(harness.demux.nof_tunnels(), 4);
    assert_eq!(manager.pdu_session_ids(), vec![psi(1), psi(2), psi(3), psi(4)]);
}

#[test]
fn test_bearer_teid_is_deterministic() {
    let first = allocate_bearer_teid(UeIndex(300), psi(12), drb(7));
    let second = allocate_bearer_teid(UeIndex(300), psi(12), drb(7));
    assert_eq!(first, second);
    assert_eq!(first, GtpTeid((300 << 16) | (12 << 8) | 7));
}

#[test]
fn test_duplicate_session_rejected() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(1);

    assert!(
        manager
            .setup_pdu_session(&session_item(1).with_drb(drb_item(1, &[1])))
            .success
    );

    let result = manager.setup_pdu_session(&session_item(1).with_drb(drb_item(2, &[2])));
    assert!(!result.success);
    assert_eq!(result.cause, Some(Cause::RadioNetwork));
    assert_eq!(result.gtp_tunnel, None);
    assert!(result.drb_setup_results.is_empty());

    // Existing session untouched, nothing new created
    assert_eq!(manager.nof_pdu_sessions(), 1);
    assert_eq!(manager.pdu_session(psi(1)).unwrap().drb_ids(), vec![drb(1)]);
    assert_eq!(harness.factory.ngu_configs().len(), 1);
    assert_eq!(harness.f1u_gw.created().len(), 1);
    assert_eq!(harness.demux.added().len(), 1);
}

#[test]
fn test_session_limit() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager_with_limit(1, 2);

    assert!(manager.setup_pdu_session(&session_item(1)).success);
    assert!(manager.setup_pdu_session(&session_item(2)).success);

    let result = manager.setup_pdu_session(&session_item(3));
    assert!(!result.success);
    assert_eq!(result.cause, Some(Cause::RadioNetwork));
    assert_eq!(manager.nof_pdu_sessions(), 2);
    assert_eq!(harness.factory.ngu_configs().len(), 2);

    manager.remove_pdu_session(psi(1));
    assert!(manager.setup_pdu_session(&session_item(3)).success);
}

#[test]
fn test_tunnel_registration_failure_keeps_existing_route() {
    init_test_logging();
    let harness = TestHarness::new();
    // Two managers on the same UE index collide on the session TEID
    let mut first = harness.manager(4);
    let mut second = harness.manager(4);

    assert!(first.setup_pdu_session(&session_item(1)).success);

    let result = second.setup_pdu_session(&session_item(1).with_drb(drb_item(1, &[1])));
    assert!(!result.success);
    assert_eq!(result.cause, Some(Cause::RadioNetwork));
    assert_eq!(second.nof_pdu_sessions(), 0);

    let teid = allocate_session_teid(UeIndex(4), psi(1));
    assert!(harness.demux.has_tunnel(teid));
    assert!(harness.demux.removed().is_empty());
    // DRBs are only set up once the tunnel is registered
    assert!(harness.f1u_gw.created().is_empty());
}

#[test]
fn test_release_disconnects_every_drb() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(3);

    let item = session_item(2)
        .with_drb(drb_item(1, &[1]))
        .with_drb(drb_item(2, &[2]))
        .with_drb(drb_item(3, &[3, 4]));
    assert!(manager.setup_pdu_session(&item).success);
    assert_eq!(harness.f1u_gw.nof_connected(), 3);

    let result = manager.remove_pdu_session(psi(2));
    assert!(result.success);
    assert_eq!(result.disconnected_drbs, vec![drb(1), drb(2), drb(3)]);

    let mut disconnected = harness.f1u_gw.disconnected();
    disconnected.sort_unstable();
    let expected: Vec<_> = [1, 2, 3]
        .into_iter()
        .map(|id| allocate_bearer_teid(UeIndex(3), psi(2), drb(id)))
        .collect();
    assert_eq!(disconnected, expected);
    assert_eq!(harness.f1u_gw.nof_connected(), 0);

    assert!(manager.pdu_session(psi(2)).is_none());
    assert_eq!(manager.nof_pdu_sessions(), 0);
    let session_teid = allocate_session_teid(UeIndex(3), psi(2));
    assert!(!harness.demux.has_tunnel(session_teid));
    assert_eq!(harness.demux.removed(), vec![session_teid]);
}

#[test]
fn test_release_unknown_session() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(3);
    assert!(manager.setup_pdu_session(&session_item(1)).success);

    let result = manager.remove_pdu_session(psi(9));
    assert!(!result.success);
    assert_eq!(result.cause, Some(Cause::Misc));
    assert!(result.disconnected_drbs.is_empty());
    assert_eq!(manager.nof_pdu_sessions(), 1);
    assert!(harness.demux.removed().is_empty());
}

#[test]
fn test_duplicate_drb_does_not_affect_others() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(5);

    let item = session_item(1)
        .with_drb(drb_item(1, &[1]))
        .with_drb(drb_item(1, &[2]))
        .with_drb(drb_item(2, &[3]));
    let result = manager.setup_pdu_session(&item);

    assert!(result.success);
    let outcomes: Vec<_> = result
        .drb_setup_results
        .iter()
        .map(|r| (r.drb_id, r.success, r.cause))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            (drb(1), true, None),
            (drb(1), false, Some(Cause::RadioNetwork)),
            (drb(2), true, None),
        ]
    );
    assert_eq!(harness.f1u_gw.created().len(), 2);
    assert_eq!(harness.factory.pdcp_created().len(), 2);
    assert_eq!(
        harness.factory.sdap_mapping(UeIndex(5), psi(1)),
        vec![(qfi(1), drb(1)), (qfi(3), drb(2))]
    );
}

#[test]
fn test_modify_unknown_drb_keeps_processing() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(6);
    assert!(manager
        .setup_pdu_session(&session_item(1).with_drb(drb_item(1, &[1])))
        .success);

    let mut modify = PduSessionToModifyItem::new(psi(1));
    modify.drbs_to_setup.push(drb_item(2, &[5]));
    modify
        .drbs_to_modify
        .push(DrbToModifyItem::with_dl_tunnel(drb(7), dl_tunnel(0xdead)));
    modify
        .drbs_to_modify
        .push(DrbToModifyItem::with_dl_tunnel(drb(1), dl_tunnel(0xabc)));

    let result = manager.modify_pdu_session(&modify);
    assert!(result.success);
    assert_eq!(result.cause, None);

    assert_eq!(result.drb_setup_results.len(), 1);
    assert!(result.drb_setup_results[0].success);

    assert_eq!(result.drb_modification_results.len(), 2);
    assert!(!result.drb_modification_results[0].success);
    assert_eq!(result.drb_modification_results[0].drb_id, drb(7));
    assert_eq!(
        result.drb_modification_results[0].cause,
        Some(Cause::RadioNetwork)
    );
    assert!(result.drb_modification_results[1].success);

    assert_eq!(
        harness.f1u_gw.attached(),
        vec![(allocate_bearer_teid(UeIndex(6), psi(1), drb(1)), GtpTeid(0xabc))]
    );
    assert_eq!(
        manager.pdu_session(psi(1)).unwrap().drb_ids(),
        vec![drb(1), drb(2)]
    );
}

#[test]
fn test_modify_unknown_session() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(6);

    let result = manager.modify_pdu_session(&PduSessionToModifyItem::new(psi(4)));
    assert!(!result.success);
    assert_eq!(result.cause, Some(Cause::Misc));
}

#[test]
fn test_modify_without_dl_tunnel() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(6);
    assert!(manager
        .setup_pdu_session(&session_item(1).with_drb(drb_item(1, &[1])))
        .success);

    let mut modify = PduSessionToModifyItem::new(psi(1));
    modify.drbs_to_modify.push(DrbToModifyItem {
        drb_id: drb(1),
        dl_up_params: Vec::new(),
        qos_flows_to_remove: Vec::new(),
    });

    let result = manager.modify_pdu_session(&modify);
    assert!(result.success);
    assert!(!result.drb_modification_results[0].success);
    assert_eq!(
        result.drb_modification_results[0].cause,
        Some(Cause::Protocol)
    );
    assert!(harness.f1u_gw.attached().is_empty());
}

#[test]
fn test_modify_removes_drbs() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(8);
    let item = session_item(1)
        .with_drb(drb_item(1, &[1]))
        .with_drb(drb_item(2, &[2]));
    assert!(manager.setup_pdu_session(&item).success);

    let mut modify = PduSessionToModifyItem::new(psi(1));
    modify.drbs_to_remove = vec![drb(2), drb(9)];
    let result = manager.modify_pdu_session(&modify);

    assert!(result.success);
    assert_eq!(result.drb_removed, vec![drb(2)]);
    assert_eq!(
        harness.factory.sdap_mapping(UeIndex(8), psi(1)),
        vec![(qfi(1), drb(1))]
    );
    assert_eq!(
        harness.f1u_gw.disconnected(),
        vec![allocate_bearer_teid(UeIndex(8), psi(1), drb(2))]
    );
    assert_eq!(manager.pdu_session(psi(1)).unwrap().drb_ids(), vec![drb(1)]);
}

#[test]
fn test_modify_removes_qos_flows() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(8);
    assert!(manager
        .setup_pdu_session(&session_item(1).with_drb(drb_item(1, &[1, 2])))
        .success);

    let mut modify = PduSessionToModifyItem::new(psi(1));
    let mut drb_modify = DrbToModifyItem::with_dl_tunnel(drb(1), dl_tunnel(0x77));
    drb_modify.qos_flows_to_remove = vec![qfi(2), qfi(7)];
    modify.drbs_to_modify.push(drb_modify);

    let result = manager.modify_pdu_session(&modify);
    assert!(result.success);
    assert!(result.drb_modification_results[0].success);
    assert_eq!(result.drb_modification_results[0].removed_qos_flows, vec![qfi(2)]);

    assert_eq!(
        harness.factory.sdap_mapping(UeIndex(8), psi(1)),
        vec![(qfi(1), drb(1))]
    );
    let session = manager.pdu_session(psi(1)).unwrap();
    assert_eq!(session.drb(drb(1)).unwrap().qos_flow_ids(), vec![qfi(1)]);
}

#[test]
fn test_qos_flow_remapped_to_new_drb() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(9);
    assert!(manager
        .setup_pdu_session(&session_item(1).with_drb(drb_item(1, &[1])))
        .success);

    let mut modify = PduSessionToModifyItem::new(psi(1));
    modify.drbs_to_setup.push(drb_item(2, &[1]));
    let result = manager.modify_pdu_session(&modify);
    assert!(result.drb_setup_results[0].success);

    let session = manager.pdu_session(psi(1)).unwrap();
    assert_eq!(session.find_qos_flow(qfi(1)), Some(drb(2)));
    assert!(session.drb(drb(1)).unwrap().qos_flow_ids().is_empty());
    assert_eq!(
        harness.factory.sdap_mapping(UeIndex(9), psi(1)),
        vec![(qfi(1), drb(2))]
    );
}

#[test]
fn test_remove_all_sessions() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(10);
    assert!(manager
        .setup_pdu_session(&session_item(1).with_drb(drb_item(1, &[1])))
        .success);
    assert!(manager
        .setup_pdu_session(&session_item(2).with_drb(drb_item(1, &[1])))
        .success);

    let results = manager.remove_all_pdu_sessions();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(manager.nof_pdu_sessions(), 0);
    assert_eq!(harness.f1u_gw.disconnected().len(), 2);
    assert_eq!(harness.demux.nof_tunnels(), 0);
}

#[test]
fn test_dropping_manager_tears_down() {
    init_test_logging();
    let harness = TestHarness::new();
    {
        let mut manager = harness.manager(11);
        let item = session_item(1)
            .with_drb(drb_item(1, &[1]))
            .with_drb(drb_item(2, &[2]));
        assert!(manager.setup_pdu_session(&item).success);
    }

    assert_eq!(harness.f1u_gw.disconnected().len(), 2);
    assert_eq!(harness.demux.removed().len(), 1);
    assert_eq!(harness.demux.nof_tunnels(), 0);
}

#[test]
fn test_pdcp_control_events_counted() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut manager = harness.manager(12);
    assert!(manager
        .setup_pdu_session(&session_item(1).with_drb(drb_item(4, &[1])))
        .success);

    let control = harness
        .factory
        .pdcp_control(UeIndex(12), drb(4))
        .expect("PDCP created");
    control.tx.on_protocol_failure();
    control.rx.on_integrity_failure();
    control.rx.on_integrity_failure();
    control.rx.on_max_count_reached();

    let session = manager.pdu_session(psi(1)).unwrap();
    let events = session.drb(drb(4)).unwrap().control_events();
    assert_eq!(events.protocol_failures(), 1);
    assert_eq!(events.integrity_failures(), 2);
    assert_eq!(events.max_count_reached(), 1);
}

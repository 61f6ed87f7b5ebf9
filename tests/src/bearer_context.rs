//! Bearer context procedure tests
//!
//! Tests the UE level procedures of the CU-UP, the inactivity notification
//! and the CU-UP task.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::{sleep, timeout};

use integration_tests::init_test_logging;
use integration_tests::test_fixtures::{drb, drb_item, psi, session_item, test_cu_up_config};
use integration_tests::TestHarness;
use nextgsim_common::{Cause, UeIndex};
use nextgsim_cu_up::task::DEFAULT_CHANNEL_CAPACITY;
use nextgsim_cu_up::{
    allocate_session_teid, BearerContextInactivityNotification, BearerContextModificationRequest,
    BearerContextReleaseCommand, BearerContextSetupRequest, CuUpError, CuUpTask,
    PduSessionToModifyItem,
};

fn setup_request(sessions: &[u8]) -> BearerContextSetupRequest {
    BearerContextSetupRequest {
        pdu_session_resource_to_setup_list: sessions
            .iter()
            .map(|&id| session_item(id).with_drb(drb_item(1, &[1])))
            .collect(),
    }
}

#[test]
fn test_setup_creates_ue() {
    init_test_logging();
    let harness = TestHarness::new();
    let (mut cu_up, _inactivity) = harness.cu_up(test_cu_up_config());

    let response = cu_up.handle_bearer_context_setup_request(&setup_request(&[1, 2]));

    assert!(response.success);
    assert_eq!(response.ue_index, Some(UeIndex(0)));
    assert_eq!(response.pdu_session_resource_setup_list.len(), 2);
    assert!(response.pdu_session_resource_failed_list.is_empty());
    assert_eq!(cu_up.nof_ues(), 1);

    let ue = cu_up.ue_manager().find_ue(UeIndex(0)).unwrap();
    assert_eq!(ue.pdu_session_manager().pdu_session_ids(), vec![psi(1), psi(2)]);
    assert!(harness
        .demux
        .has_tunnel(allocate_session_teid(UeIndex(0), psi(2))));
}

#[test]
fn test_setup_rejects_malformed_requests() {
    init_test_logging();
    let harness = TestHarness::new();
    let (mut cu_up, _inactivity) = harness.cu_up(test_cu_up_config());

    let response = cu_up.handle_bearer_context_setup_request(&setup_request(&[3, 3]));
    assert!(!response.success);
    assert_eq!(response.cause, Some(Cause::Protocol));
    assert_eq!(response.ue_index, None);

    let response = cu_up.handle_bearer_context_setup_request(&setup_request(&[]));
    assert!(!response.success);
    assert_eq!(response.cause, Some(Cause::Protocol));

    assert_eq!(cu_up.nof_ues(), 0);
    assert!(harness.factory.ngu_configs().is_empty());
}

#[test]
fn test_setup_ue_limit() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut config = test_cu_up_config();
    config.max_nof_ues = 1;
    let (mut cu_up, _inactivity) = harness.cu_up(config);

    assert!(cu_up.handle_bearer_context_setup_request(&setup_request(&[1])).success);

    let response = cu_up.handle_bearer_context_setup_request(&setup_request(&[1]));
    assert!(!response.success);
    assert_eq!(response.cause, Some(Cause::RadioNetwork));
    assert_eq!(response.ue_index, None);
    assert_eq!(cu_up.nof_ues(), 1);
}

#[test]
fn test_ue_index_reused_after_release() {
    init_test_logging();
    let harness = TestHarness::new();
    let (mut cu_up, _inactivity) = harness.cu_up(test_cu_up_config());

    let first = cu_up.handle_bearer_context_setup_request(&setup_request(&[1]));
    let second = cu_up.handle_bearer_context_setup_request(&setup_request(&[1]));
    assert_eq!(first.ue_index, Some(UeIndex(0)));
    assert_eq!(second.ue_index, Some(UeIndex(1)));

    cu_up
        .handle_bearer_context_release_command(&BearerContextReleaseCommand {
            ue_index: UeIndex(0),
        })
        .unwrap();

    let third = cu_up.handle_bearer_context_setup_request(&setup_request(&[1]));
    assert_eq!(third.ue_index, Some(UeIndex(0)));
    assert_eq!(cu_up.ue_manager().ue_indexes(), vec![UeIndex(0), UeIndex(1)]);
}

#[test]
fn test_modification_of_unknown_ue() {
    init_test_logging();
    let harness = TestHarness::new();
    let (mut cu_up, _inactivity) = harness.cu_up(test_cu_up_config());

    let response = cu_up.handle_bearer_context_modification_request(&BearerContextModificationRequest {
        ue_index: UeIndex(5),
        ..Default::default()
    });
    assert!(!response.success);
    assert_eq!(response.cause, Some(Cause::Misc));
}

#[test]
fn test_modification_lists() {
    init_test_logging();
    let harness = TestHarness::new();
    let (mut cu_up, _inactivity) = harness.cu_up(test_cu_up_config());
    let ue_index = cu_up
        .handle_bearer_context_setup_request(&setup_request(&[1]))
        .ue_index
        .unwrap();

    let mut add_drb = PduSessionToModifyItem::new(psi(1));
    add_drb.drbs_to_setup.push(drb_item(2, &[2]));

    let request = BearerContextModificationRequest {
        ue_index,
        pdu_session_resource_to_setup_list: vec![session_item(2)],
        pdu_session_resource_to_modify_list: vec![add_drb, PduSessionToModifyItem::new(psi(9))],
        pdu_session_resource_to_remove_list: vec![psi(7)],
    };
    let response = cu_up.handle_bearer_context_modification_request(&request);

    assert!(response.success);
    assert_eq!(response.pdu_session_resource_setup_list.len(), 1);
    assert!(response.pdu_session_resource_failed_list.is_empty());

    assert_eq!(response.pdu_session_resource_modified_list.len(), 1);
    assert_eq!(response.pdu_session_resource_modified_list[0].pdu_session_id, psi(1));
    assert_eq!(response.pdu_session_resource_failed_to_modify_list.len(), 1);
    assert_eq!(
        response.pdu_session_resource_failed_to_modify_list[0].cause,
        Some(Cause::Misc)
    );

    assert_eq!(response.pdu_session_resource_released_list.len(), 1);
    assert!(!response.pdu_session_resource_released_list[0].success);

    let manager = cu_up.ue_manager().find_ue(ue_index).unwrap().pdu_session_manager();
    assert_eq!(manager.pdu_session_ids(), vec![psi(1), psi(2)]);
    assert_eq!(
        manager.pdu_session(psi(1)).unwrap().drb_ids(),
        vec![drb(1), drb(2)]
    );
}

#[test]
fn test_modification_rejects_repeated_session() {
    init_test_logging();
    let harness = TestHarness::new();
    let (mut cu_up, _inactivity) = harness.cu_up(test_cu_up_config());
    let ue_index = cu_up
        .handle_bearer_context_setup_request(&setup_request(&[1]))
        .ue_index
        .unwrap();

    let request = BearerContextModificationRequest {
        ue_index,
        pdu_session_resource_to_setup_list: vec![session_item(2)],
        pdu_session_resource_to_modify_list: vec![PduSessionToModifyItem::new(psi(2))],
        ..Default::default()
    };
    let response = cu_up.handle_bearer_context_modification_request(&request);
    assert!(!response.success);
    assert_eq!(response.cause, Some(Cause::Protocol));
    assert_eq!(
        cu_up
            .ue_manager()
            .find_ue(ue_index)
            .unwrap()
            .pdu_session_manager()
            .nof_pdu_sessions(),
        1
    );
}

#[test]
fn test_release_command() {
    init_test_logging();
    let harness = TestHarness::new();
    let (mut cu_up, _inactivity) = harness.cu_up(test_cu_up_config());
    let ue_index = cu_up
        .handle_bearer_context_setup_request(&setup_request(&[1, 2, 3]))
        .ue_index
        .unwrap();

    let complete = cu_up
        .handle_bearer_context_release_command(&BearerContextReleaseCommand { ue_index })
        .unwrap();

    assert_eq!(complete.ue_index, ue_index);
    assert_eq!(complete.released_pdu_sessions.len(), 3);
    assert!(complete.released_pdu_sessions.iter().all(|r| r.success));
    assert_eq!(harness.f1u_gw.disconnected().len(), 3);
    assert_eq!(harness.demux.nof_tunnels(), 0);
    assert_eq!(cu_up.nof_ues(), 0);

    let again = cu_up.handle_bearer_context_release_command(&BearerContextReleaseCommand { ue_index });
    assert_eq!(again, Err(CuUpError::UnknownUe(ue_index)));
}

#[tokio::test(start_paused = true)]
async fn test_inactivity_notification() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut config = test_cu_up_config();
    config.ue_inactivity_timer_ms = 100;
    let (mut cu_up, mut inactivity) = harness.cu_up(config);

    let ue_index = cu_up
        .handle_bearer_context_setup_request(&setup_request(&[1]))
        .ue_index
        .unwrap();

    let notification = timeout(Duration::from_millis(150), inactivity.recv())
        .await
        .expect("inactivity notification")
        .expect("channel open");
    assert_eq!(notification, BearerContextInactivityNotification { ue_index });
}

#[tokio::test(start_paused = true)]
async fn test_traffic_restarts_inactivity_timer() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut config = test_cu_up_config();
    config.ue_inactivity_timer_ms = 100;
    let (mut cu_up, mut inactivity) = harness.cu_up(config);

    let ue_index = cu_up
        .handle_bearer_context_setup_request(&setup_request(&[1]))
        .ue_index
        .unwrap();

    sleep(Duration::from_millis(60)).await;
    let teid = allocate_session_teid(ue_index, psi(1));
    assert!(harness.demux.dispatch(
        teid,
        Bytes::from_static(b"\x01data"),
        "10.0.2.1:2152".parse().unwrap()
    ));

    sleep(Duration::from_millis(60)).await;
    assert!(inactivity.try_recv().is_err());

    sleep(Duration::from_millis(60)).await;
    assert_eq!(
        inactivity.try_recv().ok(),
        Some(BearerContextInactivityNotification { ue_index })
    );
}

#[tokio::test(start_paused = true)]
async fn test_release_stops_inactivity_timer() {
    init_test_logging();
    let harness = TestHarness::new();
    let mut config = test_cu_up_config();
    config.ue_inactivity_timer_ms = 100;
    let (mut cu_up, mut inactivity) = harness.cu_up(config);

    let ue_index = cu_up
        .handle_bearer_context_setup_request(&setup_request(&[1]))
        .ue_index
        .unwrap();
    cu_up
        .handle_bearer_context_release_command(&BearerContextReleaseCommand { ue_index })
        .unwrap();

    sleep(Duration::from_millis(200)).await;
    assert!(inactivity.try_recv().is_err());
}

#[tokio::test]
async fn test_cu_up_task() {
    init_test_logging();
    let harness = TestHarness::new();
    let (cu_up, _inactivity) = harness.cu_up(test_cu_up_config());
    let (task, handle) = CuUpTask::new(cu_up, DEFAULT_CHANNEL_CAPACITY);
    let join = tokio::spawn(task.run());

    let response = handle
        .bearer_context_setup(setup_request(&[1, 2]))
        .await
        .unwrap();
    assert!(response.success);
    let ue_index = response.ue_index.unwrap();
    assert_eq!(handle.nof_ues().await.unwrap(), 1);

    let mut modify = PduSessionToModifyItem::new(psi(2));
    modify.drbs_to_remove.push(drb(1));
    let response = handle
        .bearer_context_modification(BearerContextModificationRequest {
            ue_index,
            pdu_session_resource_to_modify_list: vec![modify],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(response.pdu_session_resource_modified_list[0].drb_removed, vec![drb(1)]);

    let complete = handle
        .bearer_context_release(BearerContextReleaseCommand { ue_index })
        .await
        .unwrap();
    assert_eq!(complete.released_pdu_sessions.len(), 2);

    let unknown = handle
        .bearer_context_release(BearerContextReleaseCommand { ue_index })
        .await;
    assert_eq!(unknown, Err(CuUpError::UnknownUe(ue_index)));

    handle.shutdown().await.unwrap();
    let cu_up = join.await.unwrap();
    assert_eq!(cu_up.nof_ues(), 0);
    assert_eq!(harness.f1u_gw.nof_connected(), 0);

    assert_eq!(handle.nof_ues().await, Err(CuUpError::TaskClosed));
}

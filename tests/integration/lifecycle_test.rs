//! Tab lifecycle scenarios: add, delete and refresh with bound connections.

use pretty_assertions::assert_eq;

use query_console::api::MockCall;
use query_console::config::ConnectionParams;
use query_console::query::{LogType, UserQueryOutcome};
use query_console::store::{ConnBinding, EditorState, DEFAULT_TAB_NAME};

use super::common::Fixture;

#[tokio::test]
async fn test_add_tab_clones_worksheet_connection() {
    let fx = Fixture::open().await;
    let wke_conn = fx
        .console
        .store()
        .conns()
        .for_worksheet(fx.worksheet)
        .unwrap();

    let tab = fx.console.tabs().add_tab(fx.worksheet, None).await.unwrap();

    let tab_conn = fx.console.store().conns().for_tab(tab).unwrap();
    assert_eq!(tab_conn.binding, ConnBinding::QueryTab(tab));
    assert_eq!(tab_conn.name, "server1");
    assert_eq!(tab_conn.active_db.as_deref(), Some("db"));
    assert_ne!(tab_conn.id, wke_conn.id);
    assert!(fx.api.calls().contains(&MockCall::Clone { id: wke_conn.id }));

    assert_eq!(fx.console.store().tab(tab).unwrap().name, "Query Tab 2");
    assert_eq!(
        fx.console
            .store()
            .tabs()
            .worksheet(fx.worksheet)
            .unwrap()
            .active_query_tab_id,
        Some(tab)
    );
}

#[tokio::test]
async fn test_failed_clone_leaves_tab_unbound() {
    let fx = Fixture::open().await;
    fx.api.fail_clone(true);

    let tab = fx.console.tabs().add_tab(fx.worksheet, None).await.unwrap();

    assert!(fx.console.store().tab(tab).is_some());
    assert!(fx.console.store().mem().contains(tab));
    assert!(fx.console.store().conns().for_tab(tab).is_none());
}

#[tokio::test]
async fn test_delete_tab_releases_connection_and_cascades() {
    let fx = Fixture::open().await;
    let tab_conn = fx.console.store().conns().for_tab(fx.tab).unwrap();
    fx.console
        .store()
        .tabs_mut()
        .bind_file(fx.tab, "/tmp/report.sql");

    fx.console.tabs().delete_tab(fx.tab).await.unwrap();

    assert!(fx.api.calls().contains(&MockCall::Release {
        id: tab_conn.id.clone()
    }));
    assert!(fx.console.store().tab(fx.tab).is_none());
    assert!(!fx.console.store().mem().contains(fx.tab));
    assert!(fx.console.store().conns().find(&tab_conn.id).is_none());
    assert!(fx.console.store().tabs().editor(fx.tab).is_none());
    assert!(fx.console.store().tabs().file_handle(fx.tab).is_none());
    assert!(fx
        .console
        .store()
        .conns()
        .for_worksheet(fx.worksheet)
        .is_some());
}

#[tokio::test]
async fn test_delete_tab_survives_release_failure() {
    let fx = Fixture::open().await;
    fx.api.fail_release(true);

    fx.console.tabs().delete_tab(fx.tab).await.unwrap();

    assert!(fx.console.store().tab(fx.tab).is_none());
    assert!(fx.console.store().conns().for_tab(fx.tab).is_none());
}

#[tokio::test]
async fn test_delete_active_tab_activates_remaining_tab() {
    let fx = Fixture::open().await;
    let second = fx.console.tabs().add_tab(fx.worksheet, None).await.unwrap();
    let third = fx.console.tabs().add_tab(fx.worksheet, None).await.unwrap();

    fx.console.tabs().delete_tab(third).await.unwrap();

    let active = fx
        .console
        .store()
        .tabs()
        .worksheet(fx.worksheet)
        .unwrap()
        .active_query_tab_id;
    assert_eq!(active, Some(second));
}

#[tokio::test]
async fn test_refresh_last_tab_keeps_connection() {
    let fx = Fixture::open().await;
    let tab_conn = fx.console.store().conns().for_tab(fx.tab).unwrap();
    fx.console
        .dispatcher()
        .fetch_user_query(fx.tab, "SELECT 1")
        .await
        .unwrap();
    fx.console.store().tabs_mut().editor_mut(fx.tab).unwrap().sql = "SELECT 1".to_string();

    fx.console.tabs().refresh_last_tab(fx.tab).unwrap();

    let tab = fx.console.store().tab(fx.tab).unwrap();
    assert_eq!(tab.name, DEFAULT_TAB_NAME);
    assert_eq!(
        fx.console.store().tabs().editor(fx.tab),
        Some(&EditorState::default())
    );
    assert!(fx.mem().query_results.is_empty());
    assert!(fx.mem().prvw_data.is_empty());
    assert_eq!(fx.console.store().conns().for_tab(fx.tab), Some(tab_conn));
    assert!(!fx
        .api
        .calls()
        .iter()
        .any(|call| matches!(call, MockCall::Release { .. })));
}

#[tokio::test]
async fn test_close_worksheet_releases_everything() {
    let fx = Fixture::open().await;
    let extra = fx.console.tabs().add_tab(fx.worksheet, None).await.unwrap();

    fx.console.close_worksheet(fx.worksheet).await.unwrap();

    let releases = fx
        .api
        .calls()
        .iter()
        .filter(|call| matches!(call, MockCall::Release { .. }))
        .count();
    assert_eq!(releases, 3);
    assert!(fx.console.store().tab(fx.tab).is_none());
    assert!(fx.console.store().tab(extra).is_none());
    assert!(fx
        .console
        .store()
        .tabs()
        .tabs_of(fx.worksheet)
        .is_empty());
    assert!(fx.console.store().tabs().worksheet(fx.worksheet).is_none());
}

#[tokio::test]
async fn test_tab_deleted_during_clone_releases_the_clone() {
    let fx = Fixture::open().await;
    let worksheet = fx.console.store().create_worksheet("SECOND");
    let wke_conn = fx
        .console
        .connections()
        .open_for_worksheet(worksheet, &ConnectionParams::new("server2", "maxuser"))
        .await
        .unwrap();
    let gate = fx.api.hold_clone();

    let tabs = fx.console.tabs().clone();
    let adding = tokio::spawn(async move { tabs.add_tab(worksheet, None).await });
    let source = wke_conn.id.clone();
    assert!(fx
        .api
        .wait_for_call(|call| matches!(call, MockCall::Clone { id } if *id == source))
        .await);

    let new_tab = fx
        .console
        .store()
        .tabs()
        .worksheet(worksheet)
        .unwrap()
        .active_query_tab_id
        .unwrap();
    fx.console.tabs().delete_tab(new_tab).await.unwrap();

    gate.notify_one();
    assert_eq!(adding.await.unwrap().unwrap(), new_tab);

    assert!(fx.console.store().conns().for_tab(new_tab).is_none());
    let released: Vec<MockCall> = fx
        .api
        .calls()
        .into_iter()
        .filter(|call| matches!(call, MockCall::Release { .. }))
        .collect();
    assert_eq!(released.len(), 1);
    assert!(!released.contains(&MockCall::Release { id: wke_conn.id }));

    fx.console.close_worksheet(worksheet).await.unwrap();
    assert!(fx
        .console
        .store()
        .conns()
        .for_worksheet(worksheet)
        .is_none());
}

#[tokio::test]
async fn test_delete_tab_with_query_in_flight() {
    let fx = Fixture::open().await;
    let slow = "SELECT SLEEP(100)";
    let gate = fx.api.hold(slow);

    let dispatcher = fx.console.dispatcher().clone();
    let tab = fx.tab;
    let running = tokio::spawn(async move { dispatcher.fetch_user_query(tab, slow).await });
    assert!(fx.api.wait_for_query(slow).await);

    fx.console.tabs().delete_tab(fx.tab).await.unwrap();
    gate.notify_one();

    assert_eq!(running.await.unwrap().unwrap(), UserQueryOutcome::Superseded);
    assert!(!fx.console.store().mem().contains(fx.tab));
    assert!(fx.console.store().tab(fx.tab).is_none());
    assert_eq!(fx.console.log().of_type(LogType::UserLogs).len(), 1);
}

#[tokio::test]
async fn test_refresh_last_tab_with_query_in_flight() {
    let fx = Fixture::open().await;
    let slow = "SELECT SLEEP(100)";
    let gate = fx.api.hold(slow);

    let dispatcher = fx.console.dispatcher().clone();
    let tab = fx.tab;
    let running = tokio::spawn(async move { dispatcher.fetch_user_query(tab, slow).await });
    assert!(fx.api.wait_for_query(slow).await);
    assert!(fx.mem().is_conn_busy);

    fx.console.tabs().refresh_last_tab(fx.tab).unwrap();
    gate.notify_one();

    assert_eq!(running.await.unwrap().unwrap(), UserQueryOutcome::Superseded);
    let mem = fx.mem();
    assert!(fx.console.store().mem().contains(fx.tab));
    assert!(mem.query_results.is_empty());
    assert!(!mem.is_conn_busy);
}

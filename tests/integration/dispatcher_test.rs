//! Query dispatch scenarios against the scripted API.

use pretty_assertions::assert_eq;
use serde_json::json;

use query_console::api::{MockCall, QueryRequest, ResultSet, QUERY_CANCELED};
use query_console::error::ConsoleError;
use query_console::notify::NotificationKind;
use query_console::query::{
    LogType, LoggedResult, PreviewMode, StopOutcome, UserQueryOutcome, STOP_FAILED,
};
use query_console::store::QueryRunState;

use super::common::Fixture;

#[tokio::test]
async fn test_preview_loads_then_settles() {
    let fx = Fixture::open().await;
    let sql = "SELECT * FROM db.t1 LIMIT 1000";
    let gate = fx.api.hold(sql);

    let dispatcher = fx.console.dispatcher().clone();
    let tab = fx.tab;
    let pending =
        tokio::spawn(async move { dispatcher.fetch_preview(tab, "db.t1", PreviewMode::Data).await });

    assert!(fx.api.wait_for_query(sql).await);
    assert!(fx.mem().prvw_data.is_loading);
    assert!(fx.mem().prvw_data.request_sent_time.is_some());

    gate.notify_one();
    let data = pending.await.unwrap().unwrap();

    let slot = fx.mem().prvw_data;
    assert!(!slot.is_loading);
    assert!(slot.total_duration >= 0.0);
    assert_eq!(slot.data, Some(data));
    assert!(fx.mem().prvw_data_details.is_empty());

    let entries = fx.console.log().of_type(LogType::ActionLogs);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].sql, sql);
    assert_eq!(entries[0].name.as_deref(), Some("Preview db.t1 data"));
    assert_eq!(entries[0].connection_name, "server1");
}

#[tokio::test]
async fn test_preview_details_uses_describe() {
    let fx = Fixture::open().await;

    fx.console
        .dispatcher()
        .fetch_preview(fx.tab, "my table", PreviewMode::DataDetails)
        .await
        .unwrap();

    assert_eq!(fx.api.queries().last().unwrap(), "DESCRIBE `my table`");
    assert!(fx.mem().prvw_data_details.data.is_some());
    assert!(fx.mem().prvw_data.is_empty());
}

#[tokio::test]
async fn test_clear_data_preview_empties_both_slots() {
    let fx = Fixture::open().await;
    let dispatcher = fx.console.dispatcher();
    dispatcher
        .fetch_preview(fx.tab, "t1", PreviewMode::Data)
        .await
        .unwrap();
    dispatcher
        .fetch_preview(fx.tab, "t1", PreviewMode::DataDetails)
        .await
        .unwrap();

    dispatcher.clear_data_preview(fx.tab);

    assert!(fx.mem().prvw_data.is_empty());
    assert!(fx.mem().prvw_data_details.is_empty());
}

#[tokio::test]
async fn test_failed_preview_keeps_previous_data() {
    let fx = Fixture::open().await;
    let dispatcher = fx.console.dispatcher();
    let first = dispatcher
        .fetch_preview(fx.tab, "t1", PreviewMode::Data)
        .await
        .unwrap();

    fx.api.reply(
        "SELECT * FROM t1 LIMIT 1000",
        Err(ConsoleError::transport("connection refused")),
    );
    let err = dispatcher
        .fetch_preview(fx.tab, "t1", PreviewMode::Data)
        .await
        .unwrap_err();

    assert!(err.is_transport());
    let slot = fx.mem().prvw_data;
    assert!(!slot.is_loading);
    assert_eq!(slot.data, Some(first));
}

#[tokio::test]
async fn test_user_query_sends_row_limit_on_tab_connection() {
    let fx = Fixture::open().await;
    let tab_conn = fx.console.store().conns().for_tab(fx.tab).unwrap();

    let outcome = fx
        .console
        .dispatcher()
        .fetch_user_query(fx.tab, "SELECT 1")
        .await
        .unwrap();

    assert!(matches!(outcome, UserQueryOutcome::Completed(_)));
    assert!(fx.api.calls().contains(&MockCall::Query {
        id: tab_conn.id,
        request: QueryRequest::new("SELECT 1", Some(10000)),
    }));

    let mem = fx.mem();
    assert!(!mem.is_conn_busy);
    assert!(!mem.query_results.result.is_loading);
    assert!(mem.query_results.abort.is_none());
    assert_eq!(mem.query_results.run_state, QueryRunState::Settled);

    let entries = fx.console.log().of_type(LogType::UserLogs);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].sql, "SELECT 1");
    assert!(entries[0].name.is_none());
}

#[tokio::test]
async fn test_second_query_owns_the_slot() {
    let fx = Fixture::open().await;
    let slow = "SELECT SLEEP(10)";
    let gate = fx.api.hold(slow);

    let dispatcher = fx.console.dispatcher().clone();
    let tab = fx.tab;
    let first = tokio::spawn(async move { dispatcher.fetch_user_query(tab, slow).await });
    assert!(fx.api.wait_for_query(slow).await);
    let first_slot = fx.mem().query_results.result;
    let first_abort = fx.mem().query_results.abort.unwrap();

    let second = fx
        .console
        .dispatcher()
        .fetch_user_query(fx.tab, "SELECT 2")
        .await
        .unwrap();
    let second_data = match second {
        UserQueryOutcome::Completed(data) => data,
        other => panic!("expected the second query to complete, got {other:?}"),
    };
    let settled = fx.mem().query_results.result;
    assert_ne!(settled.request_id, first_slot.request_id);
    assert!(settled.request_sent_time >= first_slot.request_sent_time);

    gate.notify_one();
    assert_eq!(first.await.unwrap().unwrap(), UserQueryOutcome::Superseded);

    let mem = fx.mem();
    assert_eq!(mem.query_results.result, settled);
    assert_eq!(mem.query_results.result.data, Some(second_data));
    assert!(mem.query_results.abort.is_none());
    assert!(!first_abort.is_cancelled());
    assert_eq!(fx.console.log().of_type(LogType::UserLogs).len(), 2);
}

#[tokio::test]
async fn test_stop_user_query_kills_running_query() {
    let fx = Fixture::open().await;
    let slow = "SELECT SLEEP(100)";
    fx.api.hold(slow);

    let dispatcher = fx.console.dispatcher().clone();
    let tab = fx.tab;
    let running = tokio::spawn(async move { dispatcher.fetch_user_query(tab, slow).await });
    assert!(fx.api.wait_for_query(slow).await);
    let abort = fx.mem().query_results.abort.unwrap();
    assert!(fx.mem().is_conn_busy);

    let stop = fx.console.dispatcher().stop_user_query(fx.tab).await.unwrap();

    assert_eq!(stop, StopOutcome::Killed);
    assert!(fx.mem().has_kill_flag());
    assert!(abort.is_cancelled());

    let kill_sql = format!("KILL QUERY {}", fx.tab_thread_id());
    let wke_conn = fx
        .console
        .store()
        .conns()
        .for_worksheet(fx.worksheet)
        .unwrap();
    let kills: Vec<_> = fx
        .api
        .calls()
        .into_iter()
        .filter(|call| matches!(call, MockCall::Query { request, .. } if request.sql == kill_sql))
        .collect();
    assert_eq!(
        kills,
        vec![MockCall::Query {
            id: wke_conn.id,
            request: QueryRequest::new(kill_sql.clone(), None),
        }]
    );

    let UserQueryOutcome::Killed(data) = running.await.unwrap().unwrap() else {
        panic!("expected the query to be killed");
    };
    assert_eq!(data.results(), &[json!({"message": QUERY_CANCELED})]);

    let mem = fx.mem();
    assert!(!mem.has_kill_flag());
    assert!(!mem.is_conn_busy);
    assert!(mem.query_results.abort.is_none());
    assert_eq!(mem.query_results.result.data, Some(data));

    let entries = fx.console.log().of_type(LogType::UserLogs);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].sql, slow);
}

#[tokio::test]
async fn test_late_kill_reply_leaves_next_query_running() {
    let fx = Fixture::open().await;
    let kill_sql = format!("KILL QUERY {}", fx.tab_thread_id());
    let kill_gate = fx.api.hold(kill_sql.clone());
    let first_gate = fx.api.hold("SELECT A");
    let next_gate = fx.api.hold("SELECT B");

    let dispatcher = fx.console.dispatcher().clone();
    let tab = fx.tab;
    let first = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.fetch_user_query(tab, "SELECT A").await }
    });
    assert!(fx.api.wait_for_query("SELECT A").await);

    let stop = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.stop_user_query(tab).await }
    });
    assert!(fx.api.wait_for_query(&kill_sql).await);

    first_gate.notify_one();
    assert!(matches!(
        first.await.unwrap().unwrap(),
        UserQueryOutcome::Completed(_)
    ));

    let next = tokio::spawn(async move { dispatcher.fetch_user_query(tab, "SELECT B").await });
    assert!(fx.api.wait_for_query("SELECT B").await);
    let next_abort = fx.mem().query_results.abort.unwrap();

    kill_gate.notify_one();
    assert_eq!(stop.await.unwrap().unwrap(), StopOutcome::Killed);

    assert!(!fx.mem().has_kill_flag());
    assert_eq!(fx.mem().query_results.run_state, QueryRunState::Running);
    assert!(!next_abort.is_cancelled());

    next_gate.notify_one();
    match next.await.unwrap().unwrap() {
        UserQueryOutcome::Completed(data) => assert_eq!(data.attributes.sql, "SELECT B"),
        other => panic!("expected the next query to complete, got {other:?}"),
    }
}

#[tokio::test]
async fn test_refused_kill_notifies_and_leaves_query_running() {
    let fx = Fixture::open().await;
    let slow = "SELECT SLEEP(100)";
    let gate = fx.api.hold(slow);
    let kill_sql = format!("KILL QUERY {}", fx.tab_thread_id());
    let unknown_thread = format!("Unknown thread id: {}", fx.tab_thread_id());
    fx.api.reply(
        kill_sql.clone(),
        Ok(ResultSet::new(
            kill_sql,
            vec![json!({"errno": 1094, "message": unknown_thread, "sqlstate": "HY000"})],
        )),
    );

    let dispatcher = fx.console.dispatcher().clone();
    let tab = fx.tab;
    let running = tokio::spawn(async move { dispatcher.fetch_user_query(tab, slow).await });
    assert!(fx.api.wait_for_query(slow).await);
    let abort = fx.mem().query_results.abort.unwrap();

    let stop = fx.console.dispatcher().stop_user_query(fx.tab).await.unwrap();

    let expected = vec![
        STOP_FAILED.to_string(),
        "errno: 1094".to_string(),
        format!("message: {unknown_thread}"),
        "sqlstate: HY000".to_string(),
    ];
    assert_eq!(stop, StopOutcome::Refused(expected.clone()));
    assert!(!fx.mem().has_kill_flag());
    assert_eq!(fx.mem().query_results.run_state, QueryRunState::Running);
    assert!(!abort.is_cancelled());

    let notifications = fx.console.notifier().drain();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Error);
    assert_eq!(notifications[0].lines, expected);

    gate.notify_one();
    assert!(matches!(
        running.await.unwrap().unwrap(),
        UserQueryOutcome::Completed(_)
    ));
}

#[tokio::test]
async fn test_stop_without_running_query_does_not_arm_kill_flag() {
    let fx = Fixture::open().await;

    let stop = fx.console.dispatcher().stop_user_query(fx.tab).await.unwrap();

    assert_eq!(stop, StopOutcome::Killed);
    assert!(!fx.mem().has_kill_flag());
    assert_eq!(fx.mem().query_results.run_state, QueryRunState::Idle);
}

#[tokio::test]
async fn test_unreachable_kill_is_reported() {
    let fx = Fixture::open().await;
    let kill_sql = format!("KILL QUERY {}", fx.tab_thread_id());
    fx.api
        .reply(kill_sql, Err(ConsoleError::transport("connection reset")));

    let stop = fx.console.dispatcher().stop_user_query(fx.tab).await.unwrap();

    assert_eq!(
        stop,
        StopOutcome::Unreachable(ConsoleError::transport("connection reset"))
    );
    assert!(fx.console.notifier().is_empty());
}

#[tokio::test]
async fn test_drop_database_refreshes_active_db_before_commit() {
    let fx = Fixture::open().await;
    let refresh = "SELECT DATABASE()";
    let gate = fx.api.hold(refresh);
    fx.api.reply(
        refresh,
        Ok(ResultSet::new(
            refresh,
            vec![json!({"fields": ["DATABASE()"], "data": [[null]], "complete": true})],
        )),
    );
    let tab_conn = fx.console.store().conns().for_tab(fx.tab).unwrap();
    assert_eq!(tab_conn.active_db.as_deref(), Some("db"));

    let dispatcher = fx.console.dispatcher().clone();
    let tab = fx.tab;
    let pending =
        tokio::spawn(async move { dispatcher.fetch_user_query(tab, "DROP DATABASE db").await });

    assert!(fx.api.wait_for_query(refresh).await);
    let mem = fx.mem();
    assert!(mem.query_results.result.is_loading);
    assert!(mem.query_results.result.data.is_none());

    gate.notify_one();
    assert!(matches!(
        pending.await.unwrap().unwrap(),
        UserQueryOutcome::Completed(_)
    ));

    assert!(!fx.mem().query_results.result.is_loading);
    assert!(fx.mem().query_results.result.data.is_some());
    let tab_conn = fx.console.store().conns().find(&tab_conn.id).unwrap();
    assert_eq!(tab_conn.active_db, None);

    let queries = fx.api.queries();
    assert_eq!(&queries[queries.len() - 2..], ["DROP DATABASE db", refresh]);
}

#[tokio::test]
async fn test_use_refreshes_active_db() {
    let fx = Fixture::open().await;
    let refresh = "SELECT DATABASE()";
    fx.api.reply(
        refresh,
        Ok(ResultSet::new(
            refresh,
            vec![json!({"fields": ["DATABASE()"], "data": [["sales"]], "complete": true})],
        )),
    );

    fx.console
        .dispatcher()
        .fetch_user_query(fx.tab, "use sales")
        .await
        .unwrap();

    let tab_conn = fx.console.store().conns().for_tab(fx.tab).unwrap();
    assert_eq!(tab_conn.active_db.as_deref(), Some("sales"));
}

#[tokio::test]
async fn test_transport_failure_settles_without_data() {
    let fx = Fixture::open().await;
    fx.api.reply(
        "SELECT broken",
        Err(ConsoleError::transport("connection refused")),
    );

    let outcome = fx
        .console
        .dispatcher()
        .fetch_user_query(fx.tab, "SELECT broken")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        UserQueryOutcome::Failed(ConsoleError::transport("connection refused"))
    );
    let mem = fx.mem();
    assert!(!mem.query_results.result.is_loading);
    assert!(mem.query_results.result.data.is_none());
    assert!(!mem.is_conn_busy);

    let entries = fx.console.log().of_type(LogType::UserLogs);
    assert_eq!(
        entries[0].result,
        LoggedResult::Error("Transport error: connection refused".to_string())
    );
}

#[tokio::test]
async fn test_query_on_unknown_tab_is_not_found() {
    let fx = Fixture::open().await;
    let tab = fx.tab;
    fx.console.tabs().delete_tab(tab).await.unwrap();

    let err = fx
        .console
        .dispatcher()
        .fetch_user_query(tab, "SELECT 1")
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Not Found");
}

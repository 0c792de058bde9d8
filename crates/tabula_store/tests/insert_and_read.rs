use std::collections::HashSet;

use tabula_store::{
    Fields, FilterSpec, InsertMode, MutationRequest, RecordReadApi, RecordWriteApi,
    SelectOptions, TabulaError, TabulaResult, TabulaStore, Task, Value,
    WriteOptions, WriteOutcome, open_store_with,
};
use tempfile::{TempDir, tempdir};

async fn open_store(limit: Option<u64>) -> TabulaResult<(TempDir, TabulaStore)> {
    let dir = tempdir().expect("tempdir");
    let store = open_store_with(dir.path(), |config| {
        if let (Some(limit), Some(limits)) = (limit, config.limits.as_mut()) {
            limits.default_select_limit = Some(limit);
        }
    })
    .await?;
    Ok((dir, store))
}

fn task(name: &str) -> MutationRequest {
    MutationRequest::new().set("name", name)
}

#[tokio::test]
async fn insert_without_id_generates_unique_ids() -> TabulaResult<()> {
    let (_dir, store) = open_store(None).await?;
    let tasks = store.records::<Task>();
    let mut ids = HashSet::new();
    for index in 0..20 {
        let inserted = tasks
            .insert(
                task(&format!("task {index}")),
                InsertMode::Statement,
                WriteOptions::default(),
            )
            .await?
            .returned()
            .expect("returned");
        assert!(!inserted.id.is_empty());
        assert_eq!(inserted.point, 70);
        assert!(inserted.created_at.is_some());
        ids.insert(inserted.id);
    }
    assert_eq!(ids.len(), 20);
    Ok(())
}

#[tokio::test]
async fn colliding_id_is_a_duplicate_key_and_keeps_the_original() -> TabulaResult<()> {
    let (_dir, store) = open_store(None).await?;
    let tasks = store.records::<Task>();
    tasks
        .insert(
            task("original").with_id("t-1").set("point", 5),
            InsertMode::Statement,
            WriteOptions::default(),
        )
        .await?;

    let err = tasks
        .insert(
            task("intruder").with_id("t-1"),
            InsertMode::Statement,
            WriteOptions::default(),
        )
        .await
        .expect_err("duplicate id");
    assert!(err.is_duplicate_key(), "unexpected error: {err}");
    assert!(!err.is_retryable());

    let stored = tasks.get("t-1", false).await?.expect("stored");
    assert_eq!(stored.name, "original");
    assert_eq!(stored.point, 5);
    Ok(())
}

#[tokio::test]
async fn construct_mode_applies_defaults_and_requires_columns() -> TabulaResult<()> {
    let (_dir, store) = open_store(None).await?;
    let tasks = store.records::<Task>();

    let built = tasks
        .insert(
            task("built"),
            InsertMode::Construct,
            WriteOptions::default().without_returning(),
        )
        .await?
        .returned()
        .expect("constructed record");
    assert_eq!(built.point, 70);
    assert_eq!(built.note, None);
    assert!(built.created_at.is_none());

    let stored = tasks.get(&built.id, false).await?.expect("stored");
    assert_eq!(stored.name, "built");
    assert!(stored.created_at.is_some());

    let err = tasks
        .insert(
            MutationRequest::new().set("point", 1),
            InsertMode::Construct,
            WriteOptions::default(),
        )
        .await
        .expect_err("name is required");
    assert!(matches!(err, TabulaError::InvalidArgument { .. }));
    Ok(())
}

#[tokio::test]
async fn statement_insert_without_returning_reports_rows() -> TabulaResult<()> {
    let (_dir, store) = open_store(None).await?;
    let tasks = store.records::<Task>();
    let outcome = tasks
        .insert(
            task("quiet").with_id("q"),
            InsertMode::Statement,
            WriteOptions::default().without_returning(),
        )
        .await?;
    assert_eq!(outcome, WriteOutcome::Affected(1));
    assert!(tasks.exists("q").await?);
    Ok(())
}

#[tokio::test]
async fn invalid_requests_fail_before_touching_the_store() -> TabulaResult<()> {
    let (_dir, store) = open_store(None).await?;
    let tasks = store.records::<Task>();
    let cases = [
        MutationRequest::new(),
        task("x").set("colour", "red"),
        task("x").set("created_at", 1),
        task("x").set("point", "seventy"),
        task("x").set_null("name"),
        task(&"n".repeat(65)),
        task("x").with_id(""),
    ];
    for request in cases {
        let err = tasks
            .insert(request, InsertMode::Statement, WriteOptions::default())
            .await
            .expect_err("invalid request");
        assert!(
            matches!(err, TabulaError::InvalidArgument { .. }),
            "unexpected error: {err}"
        );
    }
    let all = FilterSpec::Any(vec![Fields::new().with("point", 70)]);
    assert_eq!(tasks.count_by_filter(&all).await?, 0);
    Ok(())
}

#[tokio::test]
async fn get_reports_missing_rows_on_request() -> TabulaResult<()> {
    let (_dir, store) = open_store(None).await?;
    let tasks = store.records::<Task>();
    assert!(tasks.get("missing", true).await?.is_none());
    let err = tasks.get("missing", false).await.expect_err("not found");
    assert!(err.is_not_found());
    assert!(!tasks.exists("missing").await?);
    Ok(())
}

#[tokio::test]
async fn select_by_filter_orders_and_limits() -> TabulaResult<()> {
    let (_dir, store) = open_store(Some(3)).await?;
    let tasks = store.records::<Task>();
    for index in 0..5 {
        tasks
            .insert(
                task(&format!("t{index}"))
                    .with_id(format!("id-{index}"))
                    .set("point", if index % 2 == 0 { 1 } else { 2 }),
                InsertMode::Statement,
                WriteOptions::default(),
            )
            .await?;
    }
    let any_point = FilterSpec::Any(vec![
        Fields::new().with("point", 1),
        Fields::new().with("point", 2),
    ]);

    let page = tasks
        .select_by_filter(&any_point, SelectOptions::default())
        .await?;
    assert_eq!(page.len(), 3);

    let all = tasks
        .select_by_filter(&any_point, SelectOptions::unbounded())
        .await?;
    assert_eq!(all.len(), 5);
    let mut sorted = all.clone();
    sorted.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
    assert_eq!(all, sorted);

    let two = tasks
        .select_by_filter(&any_point, SelectOptions::limit(2))
        .await?;
    assert_eq!(two.len(), 2);

    let ones = tasks
        .select_by_filter(&FilterSpec::eq("point", 1), SelectOptions::unbounded())
        .await?;
    assert_eq!(ones.len(), 3);
    assert_eq!(tasks.count_by_filter(&FilterSpec::eq("point", 2)).await?, 2);

    let none = tasks
        .select_by_filter(&FilterSpec::Any(vec![]), SelectOptions::unbounded())
        .await?;
    assert!(none.is_empty());

    let err = tasks
        .select_by_filter(&FilterSpec::All(Fields::new()), SelectOptions::default())
        .await
        .expect_err("empty mapping");
    assert!(matches!(err, TabulaError::InvalidFilter { .. }));
    let err = tasks
        .count_by_filter(&FilterSpec::eq("colour", "red"))
        .await
        .expect_err("unknown column");
    assert!(matches!(err, TabulaError::InvalidFilter { .. }));
    Ok(())
}

#[tokio::test]
async fn null_filters_and_ordered_id_lookup() -> TabulaResult<()> {
    let (_dir, store) = open_store(None).await?;
    let tasks = store.records::<Task>();
    tasks
        .insert(
            task("a").with_id("a").set("note", "has note"),
            InsertMode::Statement,
            WriteOptions::default(),
        )
        .await?;
    tasks
        .insert(task("b").with_id("b"), InsertMode::Statement, WriteOptions::default())
        .await?;

    let without_note = tasks
        .select_by_filter(
            &FilterSpec::eq("note", Value::Null),
            SelectOptions::unbounded(),
        )
        .await?;
    assert_eq!(without_note.len(), 1);
    assert_eq!(without_note[0].id, "b");

    let ids = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
    let found = tasks.select_by_ids(&ids).await?;
    let found_ids: Vec<&str> = found.iter().map(|task| task.id.as_str()).collect();
    assert_eq!(found_ids, ["b", "a"]);
    Ok(())
}

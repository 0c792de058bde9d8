use sea_orm::DatabaseTransaction;

use tabula_core::{TabulaError, TabulaResult};

/// Runs `$body` with `$scoped` bound to the connection the statements should
/// use. With `auto_commit` that is a fresh transaction (a savepoint when
/// `$conn` is itself a transaction) which is committed or rolled back here;
/// otherwise it is `$conn` and the caller owns the boundary. Dropping the
/// future before it resolves drops the transaction, which rolls it back.
macro_rules! write_scope {
    ($conn:expr, $auto_commit:expr, $what:expr, |$scoped:ident| $body:expr) => {{
        if $auto_commit {
            let tx = sea_orm::TransactionTrait::begin($conn).await?;
            let result = {
                let $scoped = &tx;
                $body.await
            };
            $crate::tx::finish(tx, result, $what).await
        } else {
            let $scoped = $conn;
            $crate::tx::report($body.await, $what)
        }
    }};
}

pub(crate) use write_scope;

pub(crate) async fn finish<T>(
    tx: DatabaseTransaction,
    result: TabulaResult<T>,
    what: &str,
) -> TabulaResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            log_failure(&err, what);
            if let Err(rollback_err) = tx.rollback().await {
                log::error!("tabula {what}: rollback failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

pub(crate) fn report<T>(result: TabulaResult<T>, what: &str) -> TabulaResult<T> {
    if let Err(err) = &result {
        log_failure(err, what);
    }
    result
}

fn log_failure(err: &TabulaError, what: &str) {
    match err {
        TabulaError::DuplicateKey { .. } => log::warn!("tabula {what}: {err}"),
        TabulaError::Storage { .. } => log::error!("tabula {what} failed: {err}"),
        _ => log::debug!("tabula {what}: {err}"),
    }
}

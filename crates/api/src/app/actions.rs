//! Action dispatch for the product edit form.
//!
//! A form submission names an action; the three stock actions are routed to
//! the mutator or the rebuilder. Every outcome, failures included, ends up as
//! notices on a `200` response. Unknown actions are left to other handlers.

use core::str::FromStr;

use chrono::Utc;
use thiserror::Error;

use stockledger_core::StockId;
use stockledger_infra::notices::{self, Notice, NoticeLog, NoticeSink};
use stockledger_infra::ProductRef;

use crate::app::dto::{ActionForm, ActionResponse};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StockAction {
    ChangeStock,
    RebuildMovements,
    RebuildStock,
}

impl StockAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            StockAction::ChangeStock => "change-stock",
            StockAction::RebuildMovements => "rebuild-movements",
            StockAction::RebuildStock => "rebuild-stock",
        }
    }
}

impl core::fmt::Display for StockAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown action '{0}'")]
pub struct UnknownAction(pub String);

impl FromStr for StockAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "change-stock" => Ok(StockAction::ChangeStock),
            "rebuild-movements" => Ok(StockAction::RebuildMovements),
            "rebuild-stock" => Ok(StockAction::RebuildStock),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Controller for actions posted from the product edit form.
pub struct ProductActions<'a> {
    services: &'a AppServices,
}

impl<'a> ProductActions<'a> {
    pub fn new(services: &'a AppServices) -> Self {
        Self { services }
    }

    #[tracing::instrument(skip_all, fields(action = %form.action, user = %principal.user_id()))]
    pub async fn exec(&self, principal: &PrincipalContext, form: ActionForm) -> ActionResponse {
        let log = NoticeLog::new();
        let handled = match form.action.parse::<StockAction>() {
            Ok(action) => {
                self.run(action, principal, &form, &log).await;
                true
            }
            Err(unknown) => {
                tracing::debug!(%unknown, "action not handled");
                false
            }
        };

        ActionResponse {
            action: form.action,
            handled,
            notices: log.into_notices(),
        }
    }

    async fn run(&self, action: StockAction, principal: &PrincipalContext, form: &ActionForm, notices: &dyn NoticeSink) {
        if let Err(err) = authz::authorize_action(principal, action) {
            tracing::warn!(error = %err, "action not allowed");
            notices.emit(Notice::warning(notices::NOT_ALLOWED_MODIFY));
            return;
        }

        match action {
            StockAction::ChangeStock => self.change_stock(form, notices).await,
            StockAction::RebuildMovements | StockAction::RebuildStock => {
                self.rebuild(action, principal, form, notices).await
            }
        }
    }

    async fn change_stock(&self, form: &ActionForm, notices: &dyn NoticeSink) {
        let Some(stock_id) = form.code().and_then(|code| code.parse::<StockId>().ok()) else {
            tracing::warn!(code = ?form.code, "stock code does not resolve");
            notices.emit(Notice::warning(notices::RECORD_NOT_FOUND));
            return;
        };

        let quantity = match form.quantity() {
            Ok(quantity) => quantity,
            Err(err) => {
                tracing::warn!(error = %err, "unreadable quantity");
                notices.emit(Notice::warning(notices::INVALID_VALUE));
                return;
            }
        };

        // The mutator reports its own outcome as notices.
        if let Ok(change) = self
            .services
            .mutator
            .set_quantity(stock_id, quantity, form.description(), notices)
            .await
        {
            tracing::debug!(count = %change.count.id, "manual count recorded");
        }
    }

    async fn rebuild(
        &self,
        action: StockAction,
        principal: &PrincipalContext,
        form: &ActionForm,
        notices: &dyn NoticeSink,
    ) {
        let token = form.multireqtoken.as_deref();
        if let Err(err) = self.services.form_tokens.consume(token, principal.user_id(), Utc::now()) {
            tracing::warn!(error = %err, "form token rejected");
            notices.emit(Notice::warning(notices::INVALID_FORM_TOKEN));
            return;
        }

        let Some(product) = form.code().and_then(|code| code.parse::<ProductRef>().ok()) else {
            tracing::debug!("no product code, nothing to rebuild");
            return;
        };

        let actor = principal.principal();
        let rebuilder = &self.services.rebuilder;
        let result = match action {
            StockAction::RebuildMovements => rebuilder.rebuild_movements(&actor, &product, notices).await,
            _ => rebuilder.rebuild_stock(&actor, &product, notices).await,
        };
        if let Ok(report) = result {
            tracing::debug!(?report, "rebuild finished");
        }
    }
}

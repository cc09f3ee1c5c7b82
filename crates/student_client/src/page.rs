//! Composition root of the assignment page: owns the bus and transport and
//! hands them to each widget it mounts.

use std::{sync::Arc, time::Duration};

use shared::domain::{AssignmentId, HowSolvedStatus};
use url::Url;

use crate::{
    assignment_list::AssignmentListRefresher,
    bus::NotificationBus,
    config::Settings,
    howsolved::{HowSolvedWidget, LogNotifier, UserNotifier},
    progress::{ProgressPoller, DEFAULT_ALERT_WINDOW},
    query_state::{Navigator, TagFilter},
    transport::{CsrfToken, HttpTransport, StudentTransport},
};

pub struct StudentPage {
    page_url: Url,
    transport: Arc<dyn StudentTransport>,
    notifier: Arc<dyn UserNotifier>,
    bus: NotificationBus,
    alert_window: Duration,
    no_filter: bool,
}

impl StudentPage {
    pub fn new(
        page_url: Url,
        transport: Arc<dyn StudentTransport>,
        notifier: Arc<dyn UserNotifier>,
    ) -> Self {
        Self {
            page_url,
            transport,
            notifier,
            bus: NotificationBus::new(),
            alert_window: DEFAULT_ALERT_WINDOW,
            no_filter: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let page_url = settings.page_url()?;
        let csrf = settings.csrf_token.as_ref().map(|value| CsrfToken {
            header: settings.csrf_header.clone(),
            value: value.clone(),
        });
        let transport = Arc::new(HttpTransport::new(page_url.clone(), csrf));
        Ok(Self::new(page_url, transport, Arc::new(LogNotifier))
            .with_alert_window(settings.alert_window())
            .with_no_filter(settings.no_filter))
    }

    pub fn with_alert_window(mut self, alert_window: Duration) -> Self {
        self.alert_window = alert_window;
        self
    }

    pub fn with_no_filter(mut self, no_filter: bool) -> Self {
        self.no_filter = no_filter;
        self
    }

    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn tag_filter<N: Navigator>(&self, navigator: N) -> TagFilter<N> {
        TagFilter::new(self.page_url.clone(), navigator)
    }

    pub fn assignment(
        &self,
        assignment_id: AssignmentId,
        initial: HowSolvedStatus,
    ) -> HowSolvedWidget {
        HowSolvedWidget::new(
            assignment_id,
            initial,
            Arc::clone(&self.transport),
            self.bus.clone(),
            Arc::clone(&self.notifier),
        )
    }

    pub async fn mount_progress(&self) -> Arc<ProgressPoller> {
        ProgressPoller::mount(
            self.page_url.clone(),
            Arc::clone(&self.transport),
            self.bus.clone(),
            self.alert_window,
        )
        .await
    }

    pub async fn mount_assignment_list(&self) -> Arc<AssignmentListRefresher> {
        AssignmentListRefresher::mount(
            self.page_url.clone(),
            self.no_filter,
            Arc::clone(&self.transport),
            self.bus.clone(),
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/page_tests.rs"]
mod tests;

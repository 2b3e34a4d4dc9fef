//! One open team: identity, live feed, alert cycle and user commands.

use std::str::FromStr;

use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    alert::{self, Alert, AlertPolicy, AlertTrigger, Flash, SignalOutcome},
    api::{ApiClient, ClientError, ClientResult, FeedFetch},
    notifier::{Notifier, Permission},
    sent::SentIndicators,
    session::SessionStore,
    watcher::FeedWatcher,
};
use crate::{
    models::{member::Member, notification::FeedNotification, team::Team},
    palette,
};

/// Run one feed delivery through the watcher and, when it holds fresh pings
/// for the local member, through the trigger. At most one alert cycle per
/// delivery; the alert carries how many pings it stands for.
pub fn react_to_feed<N: Notifier>(
    watcher: &mut FeedWatcher,
    trigger: &mut AlertTrigger<N>,
    feed: &[FeedNotification],
    members: &[Member],
    team_name: &str,
    now: Instant,
) -> Option<SignalOutcome> {
    let fresh = watcher.observe(feed);
    if fresh.is_empty() {
        return None;
    }
    let recipient = watcher.local_member()?;
    let color = members
        .iter()
        .find(|m| m.id == recipient)
        .map(|m| m.display_color().to_string())
        .unwrap_or_else(|| palette::color_for_member(&recipient.to_string()).to_string());

    info!("{} new ping(s) for member {}", fresh.len(), recipient);
    Some(trigger.signal(&Alert::new(team_name, recipient, &color, &fresh), now))
}

/// A line typed into the live view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping(String),
    Rename(String),
    Color(String),
    Leave,
    Members,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };
        let needs_arg = |cmd: fn(String) -> Command, usage: &str| {
            if rest.is_empty() {
                Err(format!("usage: {usage}"))
            } else {
                Ok(cmd(rest.to_string()))
            }
        };
        match word.to_ascii_lowercase().as_str() {
            "ping" | "p" => needs_arg(Command::Ping, "ping <member name>"),
            "rename" => needs_arg(Command::Rename, "rename <new name>"),
            "color" => needs_arg(Command::Color, "color <#RRGGBB>"),
            "leave" => Ok(Command::Leave),
            "members" | "ls" => Ok(Command::Members),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command: {other} (try 'help')")),
        }
    }
}

pub struct TeamView<N: Notifier> {
    api: ApiClient,
    team: Team,
    members: Vec<Member>,
    session: SessionStore,
    watcher: FeedWatcher,
    trigger: AlertTrigger<N>,
    sent: SentIndicators,
    etag: Option<String>,
    refresh_interval: Duration,
}

impl<N: Notifier> TeamView<N> {
    /// Load a team and check the stored identity against its members.
    ///
    /// Opening a view is a user action, so a confirmed identity also asks for
    /// notification permission here.
    pub async fn open(
        api: ApiClient,
        team_id: Uuid,
        mut session: SessionStore,
        notifier: N,
        policy: AlertPolicy,
        refresh_interval: Duration,
    ) -> ClientResult<Self> {
        let Some(team) = api.get_team(team_id).await? else {
            session.forget_team(team_id);
            persist(&session);
            return Err(ClientError::NotFound("Team not found".into()));
        };
        let members = api.members(team_id).await?;
        session.remember_team(team_id);

        let mut view = Self {
            api,
            team,
            members,
            session,
            watcher: FeedWatcher::new(),
            trigger: AlertTrigger::new(policy, notifier),
            sent: SentIndicators::new(),
            etag: None,
            refresh_interval,
        };
        view.sync_identity();
        if view.watcher.local_member().is_some() {
            view.ensure_permission();
        }
        persist(&view.session);
        Ok(view)
    }

    pub fn team(&self) -> &Team {
        &self.team
    }

    pub fn me(&self) -> Option<&Member> {
        let id = self.watcher.local_member()?;
        self.members.iter().find(|m| m.id == id)
    }

    /// Ask for notification permission unless it was already decided.
    fn ensure_permission(&mut self) -> Permission {
        let notifier = self.trigger.notifier_mut();
        match notifier.permission() {
            Permission::Default => notifier.request_permission(),
            decided => decided,
        }
    }

    /// Re-check the stored identity after the member list changed.
    fn sync_identity(&mut self) {
        let identity = self.session.reconcile(self.team.id, &self.members);
        if identity != self.watcher.local_member() {
            self.watcher.set_local_member(identity);
            // Force a full feed read so the watcher can seed.
            self.etag = None;
            persist(&self.session);
        }
    }

    /// Pull the team, its members and the feed once. A team that no longer
    /// exists is reported as `NotFound` before the identity is touched.
    pub async fn refresh(&mut self) -> ClientResult<()> {
        let Some(team) = self.api.get_team(self.team.id).await? else {
            return Err(ClientError::NotFound("Team not found".into()));
        };
        self.team = team;
        self.members = self.api.members(self.team.id).await?;
        self.sync_identity();

        if let FeedFetch::Changed { feed, etag } =
            self.api.notifications(self.team.id, self.etag.as_deref()).await?
        {
            self.etag = etag;
            let outcome = react_to_feed(
                &mut self.watcher,
                &mut self.trigger,
                &feed,
                &self.members,
                &self.team.name,
                Instant::now(),
            );
            if outcome == Some(SignalOutcome::Dropped) {
                info!("Ping arrived during a running flash");
            }
        }
        Ok(())
    }

    pub async fn join(&mut self, name: &str, color: Option<&str>) -> ClientResult<Uuid> {
        let member_id = self.api.join_team(self.team.id, name.trim(), color).await?;
        self.session.set_member(self.team.id, member_id);
        persist(&self.session);
        self.ensure_permission();

        self.members = self.api.members(self.team.id).await?;
        self.sync_identity();
        Ok(member_id)
    }

    /// Notify Action: one request, no retry. A "sent" badge is shown on the
    /// recipient for a few seconds on success.
    pub async fn ping(&mut self, name: &str) -> ClientResult<Member> {
        let Some(me) = self.watcher.local_member() else {
            return Err(not_a_member());
        };
        let target = self
            .find_member(name)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("No member named {name:?}")))?;

        self.api.send_notification(self.team.id, me, target.id).await?;
        self.sent.mark(target.id, Instant::now());
        Ok(target)
    }

    pub async fn rename(&mut self, new_name: &str) -> ClientResult<Member> {
        let me = self.watcher.local_member().ok_or_else(not_a_member)?;
        let member = self.api.rename_member(me, new_name.trim()).await?;
        self.replace_member(member.clone());
        Ok(member)
    }

    pub async fn recolor(&mut self, color: &str) -> ClientResult<Member> {
        let me = self.watcher.local_member().ok_or_else(not_a_member)?;
        let member = self.api.update_member_color(me, color.trim()).await?;
        self.replace_member(member.clone());
        Ok(member)
    }

    /// Delete the local member and forget the identity.
    pub async fn leave(&mut self) -> ClientResult<()> {
        let me = self.watcher.local_member().ok_or_else(not_a_member)?;
        self.api.delete_member(me).await?;
        self.session.forget_member(self.team.id);
        persist(&self.session);
        self.members.retain(|m| m.id != me);
        self.sync_identity();
        Ok(())
    }

    fn find_member(&self, name: &str) -> Option<&Member> {
        let name = name.trim();
        self.members
            .iter()
            .find(|m| m.name == name)
            .or_else(|| self.members.iter().find(|m| m.name.eq_ignore_ascii_case(name)))
    }

    fn replace_member(&mut self, member: Member) {
        if let Some(slot) = self.members.iter_mut().find(|m| m.id == member.id) {
            *slot = member;
        }
    }

    /// Member list as shown in the terminal.
    pub fn render_members(&self) -> String {
        let now = Instant::now();
        let me = self.watcher.local_member();
        let mut out = format!("{} ({})\n", self.team.name, self.team.id);
        if self.members.is_empty() {
            out.push_str("  no members yet\n");
        }
        for m in &self.members {
            out.push_str(&format!("  {} {}", m.display_color(), m.name));
            if Some(m.id) == me {
                out.push_str(" (you)");
            }
            if self.sent.is_showing(&m.id, now) {
                out.push_str(" ✓ pinged");
            }
            out.push('\n');
        }
        out
    }

    /// Live loop: refresh the feed, run the flash timer and watchdog, and
    /// execute commands until `quit`, end of input or Ctrl-C.
    pub async fn run<S>(mut self, mut commands: S) -> SessionStore
    where
        S: Stream<Item = std::io::Result<String>> + Unpin,
    {
        let mut refresh = tokio::time::interval(self.refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watchdog = tokio::time::interval(self.trigger.policy().watchdog_interval);
        let mut flash = self.trigger.subscribe();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        print!("{}", self.render_members());
        match self.me() {
            Some(me) => println!("Watching as {}.", me.name),
            None => println!("You are not a member of this team. Join with `nextspeaker join`."),
        }
        if self.trigger.notifier().permission() == Permission::Denied {
            println!("OS notifications are unavailable; only the flash will show.");
        }

        loop {
            tokio::select! {
                _ = refresh.tick() => {
                    if let Err(e) = self.refresh().await {
                        match e {
                            ClientError::NotFound(_) => {
                                warn!("Team {} is gone: {}", self.team.id, e);
                                println!("Team not found. It was removed from your teams.");
                                self.session.forget_team(self.team.id);
                                break;
                            }
                            other => warn!("Refresh failed: {}", other),
                        }
                    }
                }
                _ = alert::until_deadline(self.trigger.deadline()) => {
                    self.trigger.on_timer(Instant::now());
                }
                _ = watchdog.tick() => {
                    let now = Instant::now();
                    self.trigger.on_watchdog(now);
                    self.sent.prune(now);
                }
                Ok(()) = flash.changed() => {
                    let current = *flash.borrow_and_update();
                    println!("{}", render_flash(&current));
                }
                line = commands.next() => {
                    let Some(Ok(line)) = line else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<Command>() {
                        Ok(Command::Quit) => break,
                        Ok(cmd) => self.execute(cmd).await,
                        Err(msg) => println!("{msg}"),
                    }
                }
                _ = &mut ctrl_c => break,
            }
        }

        self.trigger.teardown();
        persist(&self.session);
        std::mem::take(&mut self.session)
    }

    async fn execute(&mut self, cmd: Command) {
        let result = match cmd {
            Command::Ping(name) => self.ping(&name).await.map(|m| format!("Pinged {}", m.name)),
            Command::Rename(name) => self
                .rename(&name)
                .await
                .map(|m| format!("You are now {}", m.name)),
            Command::Color(color) => self
                .recolor(&color)
                .await
                .map(|m| format!("Color set to {}", m.display_color())),
            Command::Leave => self.leave().await.map(|_| "You left the team".to_string()),
            Command::Members => Ok(self.render_members()),
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok(String::new()),
        };
        match result {
            Ok(msg) => println!("{}", msg.trim_end()),
            Err(e) => println!("Error: {e}"),
        }
    }
}

const HELP: &str = "commands: ping <name> | rename <name> | color <#RRGGBB> | leave | members | quit";

fn not_a_member() -> ClientError {
    ClientError::Rejected {
        status: reqwest::StatusCode::FORBIDDEN,
        message: "Join the team first".to_string(),
    }
}

fn persist(session: &SessionStore) {
    if let Err(e) = session.save() {
        warn!("Could not save session: {:#}", e);
    }
}

pub fn render_flash(flash: &Flash) -> String {
    if flash.active {
        format!("\x1b[7m  >>> IT'S YOUR TURN <<<  \x1b[0m (flash hsl {})", flash.color)
    } else {
        "(flash cleared)".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::client::alert::{tests::RecordingNotifier, AlertState};
    use axum::{
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::get,
        Json, Router,
    };
    use chrono::Utc;

    fn member(id: Uuid, name: &str, color: Option<&str>) -> Member {
        Member {
            id,
            team_id: Uuid::nil(),
            name: name.into(),
            color: color.map(String::from),
            created_at: Utc::now(),
        }
    }

    fn ping(id: Uuid, from: Uuid, to: Uuid) -> FeedNotification {
        FeedNotification {
            id,
            team_id: Uuid::nil(),
            from_member_id: from,
            to_member_id: to,
            message: None,
            created_at: Utc::now(),
            from_member_name: "A".into(),
            to_member_name: "B".into(),
        }
    }

    struct Fixture {
        a: Uuid,
        b: Uuid,
        members: Vec<Member>,
        watcher: FeedWatcher,
        trigger: AlertTrigger<RecordingNotifier>,
    }

    /// Team with A and B, viewed by B, watcher already seeded on an empty feed.
    fn fixture() -> Fixture {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let members = vec![member(a, "A", Some("#EF4444")), member(b, "B", Some("#10B981"))];
        let mut watcher = FeedWatcher::new();
        watcher.set_local_member(Some(b));
        let mut trigger = AlertTrigger::new(AlertPolicy::default(), RecordingNotifier::default());
        assert_eq!(
            react_to_feed(&mut watcher, &mut trigger, &[], &members, "T", Instant::now()),
            None
        );
        Fixture {
            a,
            b,
            members,
            watcher,
            trigger,
        }
    }

    #[test]
    fn single_ping_flashes_once_then_clears() {
        let Fixture { a, b, members, mut watcher, mut trigger } = fixture();
        let flash = trigger.subscribe();
        let t0 = Instant::now();
        let feed = vec![ping(Uuid::new_v4(), a, b)];

        assert_eq!(
            react_to_feed(&mut watcher, &mut trigger, &feed, &members, "T", t0),
            Some(SignalOutcome::Activated)
        );
        // B's own color drives the flash.
        assert_eq!(flash.borrow().color.to_string(), "160 84% 39%");
        assert_eq!(trigger.notifier().shown.len(), 1);

        assert!(trigger.on_timer(t0 + Duration::from_millis(3500)));
        assert_eq!(trigger.state(), AlertState::Idle);
        assert_eq!(trigger.notifier().shown.len(), 1);
    }

    #[test]
    fn redelivery_and_ping_during_flash_do_not_alert() {
        let Fixture { a, b, members, mut watcher, mut trigger } = fixture();
        let t0 = Instant::now();
        let n1 = ping(Uuid::new_v4(), a, b);
        let mut feed = vec![n1.clone()];
        react_to_feed(&mut watcher, &mut trigger, &feed, &members, "T", t0);

        // t=1s: same feed again
        assert_eq!(
            react_to_feed(&mut watcher, &mut trigger, &feed, &members, "T", t0 + Duration::from_secs(1)),
            None
        );

        // t=2s: n2 for B while the flash runs
        let n2 = ping(Uuid::new_v4(), a, b);
        feed.insert(0, n2.clone());
        assert_eq!(
            react_to_feed(&mut watcher, &mut trigger, &feed, &members, "T", t0 + Duration::from_secs(2)),
            Some(SignalOutcome::Dropped)
        );
        assert!(watcher.has_seen(&n2.id));
        assert_eq!(trigger.notifier().shown.len(), 1);

        // After the flash, the same window never alerts again.
        trigger.on_timer(t0 + Duration::from_millis(3500));
        assert_eq!(
            react_to_feed(&mut watcher, &mut trigger, &feed, &members, "T", t0 + Duration::from_secs(6)),
            None
        );
    }

    #[test]
    fn pings_for_others_never_alert() {
        let Fixture { a, b, mut members, mut watcher, mut trigger } = fixture();
        let c = Uuid::new_v4();
        members.push(member(c, "C", None));
        let feed = vec![ping(Uuid::new_v4(), b, a), ping(Uuid::new_v4(), a, c)];
        assert_eq!(
            react_to_feed(&mut watcher, &mut trigger, &feed, &members, "T", Instant::now()),
            None
        );
        assert!(!trigger.is_active());
    }

    #[test]
    fn several_pings_in_one_delivery_make_one_alert() {
        let Fixture { a, b, members, mut watcher, mut trigger } = fixture();
        let feed = vec![ping(Uuid::new_v4(), a, b), ping(Uuid::new_v4(), a, b)];
        react_to_feed(&mut watcher, &mut trigger, &feed, &members, "T", Instant::now());
        let shown = &trigger.notifier().shown;
        assert_eq!(shown.len(), 1);
        assert!(shown[0].body.ends_with("(2 pings)"));
    }

    #[test]
    fn missing_recipient_row_falls_back_to_palette_color() {
        let Fixture { a, b, mut watcher, mut trigger, .. } = fixture();
        let flash = trigger.subscribe();
        react_to_feed(&mut watcher, &mut trigger, &[ping(Uuid::new_v4(), a, b)], &[], "T", Instant::now());
        let expected = palette::Hsl::from_hex(palette::color_for_member(&b.to_string())).unwrap();
        assert_eq!(flash.borrow().color, expected);
    }

    #[test]
    fn commands_parse() {
        let parse = |s: &str| s.parse::<Command>();
        assert_eq!(parse("ping Grace Hopper"), Ok(Command::Ping("Grace Hopper".into())));
        assert_eq!(parse("  p Ada "), Ok(Command::Ping("Ada".into())));
        assert_eq!(parse("color #10B981"), Ok(Command::Color("#10B981".into())));
        assert_eq!(parse("QUIT"), Ok(Command::Quit));
        assert_eq!(parse("members"), Ok(Command::Members));
        assert!("ping".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().unwrap_err().contains("unknown command"));
    }

    #[test]
    fn flash_rendering() {
        assert_eq!(render_flash(&Flash::NEUTRAL), "(flash cleared)");
        let active = Flash {
            active: true,
            color: palette::Hsl::from_hex("#EF4444").unwrap(),
        };
        assert!(render_flash(&active).contains("0 84% 60%"));
    }

    /// What the in-process API stand-in currently serves for its one team.
    #[derive(Default)]
    struct Served {
        team: Option<Team>,
        members: Vec<Member>,
        feed: Vec<FeedNotification>,
    }

    type Shared = Arc<Mutex<Served>>;

    async fn serve_team(State(s): State<Shared>, Path(_): Path<Uuid>) -> Response {
        let team = s.lock().unwrap().team.clone();
        match team {
            Some(team) => Json(team).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "Team not found" })),
            )
                .into_response(),
        }
    }

    async fn serve_members(State(s): State<Shared>, Path(_): Path<Uuid>) -> Json<Vec<Member>> {
        Json(s.lock().unwrap().members.clone())
    }

    async fn serve_feed(
        State(s): State<Shared>,
        Path(_): Path<Uuid>,
    ) -> Json<Vec<FeedNotification>> {
        Json(s.lock().unwrap().feed.clone())
    }

    async fn api_for(served: Shared) -> ApiClient {
        let app = Router::new()
            .route("/teams/{team_id}", get(serve_team))
            .route("/teams/{team_id}/members", get(serve_members))
            .route("/teams/{team_id}/notifications", get(serve_feed))
            .with_state(served);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        ApiClient::new(&format!("http://{addr}"))
    }

    struct Live {
        served: Shared,
        view: TeamView<RecordingNotifier>,
        team_id: Uuid,
        a: Uuid,
        b: Uuid,
    }

    /// Team with A and B, opened on this device as B.
    async fn live_team() -> Live {
        let team_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let served = Arc::new(Mutex::new(Served {
            team: Some(Team {
                id: team_id,
                name: "Standup".into(),
                created_at: Utc::now(),
            }),
            members: vec![member(a, "A", Some("#EF4444")), member(b, "B", Some("#10B981"))],
            feed: Vec::new(),
        }));
        let api = api_for(served.clone()).await;

        let mut session = SessionStore::in_memory();
        session.set_member(team_id, b);
        let view = TeamView::open(
            api,
            team_id,
            session,
            RecordingNotifier::default(),
            AlertPolicy::default(),
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        Live {
            served,
            view,
            team_id,
            a,
            b,
        }
    }

    #[tokio::test]
    async fn refresh_reports_a_deleted_team_without_touching_identity() {
        let Live { served, mut view, team_id, b, .. } = live_team().await;
        view.refresh().await.unwrap();
        assert_eq!(view.watcher.local_member(), Some(b));

        {
            let mut s = served.lock().unwrap();
            s.team = None;
            s.members.clear();
        }
        let err = view.refresh().await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
        assert_eq!(view.session.member_for(team_id), Some(b));
    }

    #[tokio::test]
    async fn live_loop_forgets_a_deleted_team_and_stops() {
        let Live { served, view, team_id, .. } = live_team().await;
        served.lock().unwrap().team = None;

        let commands = tokio_stream::pending::<std::io::Result<String>>();
        let session = tokio::time::timeout(Duration::from_secs(5), view.run(commands))
            .await
            .expect("loop should stop once the team is gone");
        assert!(session.teams().is_empty());
        assert_eq!(session.member_for(team_id), None);
    }

    #[tokio::test]
    async fn stale_identity_is_cleared_and_rearms_seeding() {
        let Live { mut view, team_id, b, .. } = live_team().await;
        view.etag = Some("\"cached\"".into());

        view.members.retain(|m| m.id != b);
        view.sync_identity();

        assert_eq!(view.watcher.local_member(), None);
        assert_eq!(view.session.member_for(team_id), None);
        assert_eq!(view.etag, None);
        assert_eq!(view.session.teams(), &[team_id]);
        assert!(view.me().is_none());
    }

    #[tokio::test]
    async fn rejoining_does_not_replay_the_backlog() {
        let Live { served, mut view, team_id, a, b } = live_team().await;
        view.refresh().await.unwrap();

        // B is removed; pings for the new member C pile up meanwhile.
        let c = Uuid::new_v4();
        {
            let mut s = served.lock().unwrap();
            s.members.retain(|m| m.id != b);
            s.members.push(member(c, "C", Some("#3B82F6")));
            s.feed = vec![ping(Uuid::new_v4(), a, c), ping(Uuid::new_v4(), a, c)];
        }
        view.refresh().await.unwrap();
        assert_eq!(view.watcher.local_member(), None);
        served.lock().unwrap().feed.insert(0, ping(Uuid::new_v4(), a, c));

        // This device becomes C: the backlog seeds, it does not alert.
        view.session.set_member(team_id, c);
        view.refresh().await.unwrap();
        assert_eq!(view.watcher.local_member(), Some(c));
        assert!(!view.trigger.is_active());
        assert!(view.trigger.notifier().shown.is_empty());

        // Only a ping sent after that alerts.
        served.lock().unwrap().feed.insert(0, ping(Uuid::new_v4(), a, c));
        view.refresh().await.unwrap();
        assert!(view.trigger.is_active());
        assert_eq!(view.trigger.notifier().shown.len(), 1);
    }
}

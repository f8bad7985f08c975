use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{never, select, unbounded, Receiver, Sender};
use glob::Pattern;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::bundle::{BuildOutput, Bundle};
use crate::error::BuildError;

/// Something the controller can run a pass of and publish.
pub trait Builder: Send + Sync + 'static {
  type Output: Send + 'static;

  fn build(&self) -> Result<Self::Output, BuildError>;

  fn publish(&self, output: Self::Output) -> Result<(), BuildError>;
}

impl Builder for Bundle {
  type Output = BuildOutput;

  fn build(&self) -> Result<BuildOutput, BuildError> {
    Bundle::build(self)
  }

  fn publish(&self, output: BuildOutput) -> Result<(), BuildError> {
    output.write()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
  BuildStart { pass: usize },
  /// A change arrived while `pass` was running.
  Invalidated { pass: usize },
  StaleBuildDiscarded { pass: usize },
  Published { pass: usize },
  BuildFailed { pass: usize, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
  Idle,
  Building { pass: usize, stale: bool },
}

/// Runs at most one pass at a time and only publishes passes that no change
/// has superseded.
pub struct WatchController<B: Builder> {
  builder: Arc<B>,
  events: Option<Sender<WatchEvent>>,
  next_pass: usize,
}

impl<B: Builder> WatchController<B> {
  pub fn new(builder: B) -> Self {
    Self {
      builder: Arc::new(builder),
      events: None,
      next_pass: 1,
    }
  }

  /// Reports every transition on `events` as well as in the log.
  pub fn with_events(mut self, events: Sender<WatchEvent>) -> Self {
    self.events = Some(events);
    self
  }

  fn emit(&self, event: WatchEvent) {
    if let Some(events) = &self.events {
      let _ = events.send(event);
    }
  }

  fn start_pass(&mut self, done: &Sender<(usize, Result<B::Output, BuildError>)>) -> WatchState {
    let pass = self.next_pass;
    self.next_pass += 1;
    log::info!("[watch] starting pass {}", pass);
    self.emit(WatchEvent::BuildStart { pass });

    let builder = self.builder.clone();
    let done = done.clone();
    thread::spawn(move || {
      let result = builder.build();
      let _ = done.send((pass, result));
    });
    WatchState::Building { pass, stale: false }
  }

  fn finish_pass(&self, pass: usize, result: Result<B::Output, BuildError>) {
    let published = result.and_then(|output| self.builder.publish(output));
    match published {
      Ok(()) => {
        log::info!("[watch] pass {} published", pass);
        self.emit(WatchEvent::Published { pass });
      }
      Err(err) => {
        log::error!("[watch] pass {} failed: {}", pass, err);
        self.emit(WatchEvent::BuildFailed {
          pass,
          error: err.to_string(),
        });
      }
    }
  }

  /// Drives passes from `changes` until the channel closes and the last pass
  /// has finished. With `initial`, a first pass starts right away.
  pub fn run(mut self, changes: Receiver<PathBuf>, initial: bool) {
    let (done_tx, done_rx) = unbounded();
    let mut changes = changes;
    let mut changes_open = true;
    let mut state = if initial {
      self.start_pass(&done_tx)
    } else {
      WatchState::Idle
    };

    loop {
      if !changes_open && state == WatchState::Idle {
        break;
      }
      select! {
        recv(changes) -> change => match change {
          Ok(path) => {
            log::debug!("[watch] {} changed", path.display());
            state = match state {
              WatchState::Idle => self.start_pass(&done_tx),
              WatchState::Building { pass, .. } => {
                log::info!("[watch] pass {} is stale", pass);
                self.emit(WatchEvent::Invalidated { pass });
                WatchState::Building { pass, stale: true }
              }
            };
          }
          Err(_) => changes_open = false,
        },
        recv(done_rx) -> finished => {
          if let Ok((pass, result)) = finished {
            state = match state {
              WatchState::Building { stale: true, .. } => {
                log::info!("[watch] discarding stale pass {}", pass);
                self.emit(WatchEvent::StaleBuildDiscarded { pass });
                self.start_pass(&done_tx)
              }
              _ => {
                self.finish_pass(pass, result);
                WatchState::Idle
              }
            };
          }
        },
      }
      if !changes_open {
        changes = never();
      }
    }
  }
}

/// Sends the paths of changed files that match the include globs.
pub struct FileWatcher {
  _watcher: RecommendedWatcher,
  root: PathBuf,
}

impl FileWatcher {
  pub fn new(root: PathBuf, include: &[String]) -> Result<(Self, Receiver<PathBuf>), BuildError> {
    let patterns = include
      .iter()
      .map(|pattern| Pattern::new(pattern).map_err(|err| BuildError::Watch(err.to_string())))
      .collect::<Result<Vec<_>, _>>()?;

    let (tx, rx) = unbounded();
    let root_clone = root.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
      let event = match res {
        Ok(event) => event,
        Err(err) => {
          log::warn!("[watch] {}", err);
          return;
        }
      };
      if matches!(event.kind, EventKind::Access(_) | EventKind::Other) {
        return;
      }
      for path in event.paths {
        if Self::is_included(&path, &root_clone, &patterns) {
          let _ = tx.send(path);
        }
      }
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    Ok((
      Self {
        _watcher: watcher,
        root,
      },
      rx,
    ))
  }

  fn is_included(path: &Path, root: &Path, patterns: &[Pattern]) -> bool {
    match path.strip_prefix(root) {
      Ok(relative) => patterns.iter().any(|pattern| pattern.matches_path(relative)),
      Err(_) => false,
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }
}

/// Builds `bundle` once, then again on every matching change, until the
/// process is stopped.
pub fn watch(bundle: Bundle) -> Result<(), BuildError> {
  let root = bundle.config.input.cwd.clone();
  let include = bundle.config.watch.include.clone();
  let (watcher, changes) = FileWatcher::new(root, &include)?;
  log::info!("[watch] watching {}", watcher.root().display());
  WatchController::new(bundle).run(changes, true);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use std::time::Duration;

  struct SlowBuilder {
    version: Arc<AtomicUsize>,
    builds: Arc<AtomicUsize>,
    started: Sender<usize>,
    release: Mutex<Receiver<()>>,
    published: Arc<Mutex<Vec<usize>>>,
  }

  impl Builder for SlowBuilder {
    type Output = usize;

    fn build(&self) -> Result<usize, BuildError> {
      let seen = self.version.load(Ordering::SeqCst);
      let count = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
      self.started.send(count).unwrap();
      if count == 1 {
        self.release.lock().unwrap().recv().unwrap();
      }
      if seen == 0 {
        return Err(BuildError::Config("nothing to build".to_owned()));
      }
      Ok(seen)
    }

    fn publish(&self, output: usize) -> Result<(), BuildError> {
      self.published.lock().unwrap().push(output);
      Ok(())
    }
  }

  fn wait_for(events: &Receiver<WatchEvent>, expected: WatchEvent) {
    loop {
      let event = events.recv_timeout(Duration::from_secs(10)).unwrap();
      if event == expected {
        return;
      }
    }
  }

  #[test]
  fn changes_during_a_pass_coalesce_into_one_publish() {
    let version = Arc::new(AtomicUsize::new(1));
    let builds = Arc::new(AtomicUsize::new(0));
    let published = Arc::new(Mutex::new(vec![]));
    let (started_tx, started_rx) = unbounded();
    let (release_tx, release_rx) = unbounded();
    let (events_tx, events_rx) = unbounded();
    let (changes_tx, changes_rx) = unbounded();

    let builder = SlowBuilder {
      version: version.clone(),
      builds: builds.clone(),
      started: started_tx,
      release: Mutex::new(release_rx),
      published: published.clone(),
    };
    let controller = WatchController::new(builder).with_events(events_tx);
    let handle = thread::spawn(move || controller.run(changes_rx, false));

    changes_tx.send(PathBuf::from("src/a.ts")).unwrap();
    assert_eq!(started_rx.recv_timeout(Duration::from_secs(10)).unwrap(), 1);

    version.store(2, Ordering::SeqCst);
    changes_tx.send(PathBuf::from("src/a.ts")).unwrap();
    changes_tx.send(PathBuf::from("src/b.ts")).unwrap();
    wait_for(&events_rx, WatchEvent::Invalidated { pass: 1 });
    wait_for(&events_rx, WatchEvent::Invalidated { pass: 1 });
    release_tx.send(()).unwrap();

    wait_for(&events_rx, WatchEvent::StaleBuildDiscarded { pass: 1 });
    wait_for(&events_rx, WatchEvent::Published { pass: 2 });
    drop(changes_tx);
    handle.join().unwrap();

    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert_eq!(*published.lock().unwrap(), vec![2]);
  }

  #[test]
  fn failed_passes_publish_nothing() {
    let published = Arc::new(Mutex::new(vec![]));
    let (started_tx, _started_rx) = unbounded();
    let (release_tx, release_rx) = unbounded();
    let (events_tx, events_rx) = unbounded();
    let (changes_tx, changes_rx) = unbounded::<PathBuf>();
    release_tx.send(()).unwrap();

    let builder = SlowBuilder {
      version: Arc::new(AtomicUsize::new(0)),
      builds: Arc::new(AtomicUsize::new(0)),
      started: started_tx,
      release: Mutex::new(release_rx),
      published: published.clone(),
    };
    let controller = WatchController::new(builder).with_events(events_tx);
    let handle = thread::spawn(move || controller.run(changes_rx, true));

    match events_rx.recv_timeout(Duration::from_secs(10)).unwrap() {
      WatchEvent::BuildStart { pass } => assert_eq!(pass, 1),
      other => panic!("unexpected {:?}", other),
    }
    match events_rx.recv_timeout(Duration::from_secs(10)).unwrap() {
      WatchEvent::BuildFailed { pass, error } => {
        assert_eq!(pass, 1);
        assert!(error.contains("nothing to build"));
      }
      other => panic!("unexpected {:?}", other),
    }
    drop(changes_tx);
    handle.join().unwrap();
    assert!(published.lock().unwrap().is_empty());
  }

  #[test]
  fn only_included_paths_trigger() {
    let patterns = vec![Pattern::new("src/**").unwrap()];
    let root = Path::new("/project");
    assert!(FileWatcher::is_included(
      Path::new("/project/src/deep/a.ts"),
      root,
      &patterns
    ));
    assert!(!FileWatcher::is_included(
      Path::new("/project/dist/lib.js"),
      root,
      &patterns
    ));
    assert!(!FileWatcher::is_included(
      Path::new("/elsewhere/src/a.ts"),
      root,
      &patterns
    ));
  }
}

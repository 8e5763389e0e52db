#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use speechbridge_core::recognizer::stub::{StubEngine, StubTrigger};
use speechbridge_core::{
    BridgeError, ControlFn, EngineFactory, HandleId, HostRef, NotificationSink, RecognitionEngine,
    RecognizerConfig, Result, ScriptHost, TickFn,
};

/// In-memory stand-in for the host scripting bridge.
///
/// Holds only `HostRef`s, like a real host holding raw function pointers.
#[derive(Default)]
pub struct FakeHost {
    pub globals: Mutex<HashMap<String, HostRef<ControlFn>>>,
    pub ticks: Mutex<Vec<HostRef<TickFn>>>,
    /// Every control reference ever handed over, including removed ones.
    pub ever_registered: Mutex<Vec<HostRef<ControlFn>>>,
    pub ever_ticked: Mutex<Vec<HostRef<TickFn>>>,
    pub invocations: Mutex<Vec<(String, Vec<String>)>>,
    pub log: Mutex<Vec<String>>,
    pub refuse_register: Mutex<Option<String>>,
    pub refuse_unregister: Mutex<Option<String>>,
    pub refuse_tick: Mutex<bool>,
    pub refuse_tick_removal: Mutex<bool>,
    /// Invocations whose first argument equals this fail.
    pub fail_argument: Mutex<Option<String>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulate one host frame.
    pub fn tick(&self) {
        let ticks = self.ticks.lock().clone();
        for tick in ticks {
            let _ = tick.invoke(0.016);
        }
    }

    /// Simulate a script calling a registered global function.
    pub fn call_global(&self, name: &str) -> Result<()> {
        let handle = self.globals.lock().get(name).cloned();
        match handle {
            Some(handle) => handle.invoke(),
            None => Err(BridgeError::Other(anyhow::anyhow!(
                "attempt to call a nil value (global '{name}')"
            ))),
        }
    }

    pub fn take_invocations(&self) -> Vec<(String, Vec<String>)> {
        std::mem::take(&mut *self.invocations.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.globals.lock().is_empty() && self.ticks.lock().is_empty()
    }
}

impl ScriptHost for FakeHost {
    fn register_global_function(
        &self,
        name: &str,
        arity: u32,
        handle: HostRef<ControlFn>,
    ) -> Result<()> {
        self.log.lock().push(format!("register {name}/{arity}"));
        if self.refuse_register.lock().as_deref() == Some(name) {
            return Err(BridgeError::Other(anyhow::anyhow!("name already taken")));
        }
        self.ever_registered.lock().push(handle.clone());
        self.globals.lock().insert(name.to_string(), handle);
        Ok(())
    }

    fn unregister_global_function(&self, name: &str, handle: HandleId) -> Result<()> {
        self.log.lock().push(format!("unregister {name}"));
        if self.refuse_unregister.lock().as_deref() == Some(name) {
            return Err(BridgeError::Other(anyhow::anyhow!("unregister refused")));
        }
        let mut globals = self.globals.lock();
        match globals.get(name) {
            Some(existing) if existing.id() == handle => {
                globals.remove(name);
                Ok(())
            }
            _ => Err(BridgeError::Other(anyhow::anyhow!("no such function"))),
        }
    }

    fn add_tick_callback(&self, handle: HostRef<TickFn>) -> Result<()> {
        self.log.lock().push("add tick".into());
        if *self.refuse_tick.lock() {
            return Err(BridgeError::Other(anyhow::anyhow!("tick slots exhausted")));
        }
        self.ever_ticked.lock().push(handle.clone());
        self.ticks.lock().push(handle);
        Ok(())
    }

    fn remove_tick_callback(&self, handle: HandleId) -> Result<()> {
        self.log.lock().push("remove tick".into());
        if *self.refuse_tick_removal.lock() {
            return Err(BridgeError::Other(anyhow::anyhow!("tick removal refused")));
        }
        self.ticks.lock().retain(|tick| tick.id() != handle);
        Ok(())
    }

    fn invoke_named_callback(&self, name: &str, args: &[&str]) -> Result<()> {
        self.invocations.lock().push((
            name.to_string(),
            args.iter().map(|a| a.to_string()).collect(),
        ));
        let fail = self.fail_argument.lock().clone();
        if fail.is_some() && fail.as_deref() == args.first().copied() {
            return Err(BridgeError::Dispatch {
                callback: name.to_string(),
                reason: "runtime error in handler".into(),
            });
        }
        Ok(())
    }
}

/// Factory handing out one silent `StubEngine`, plus its trigger.
pub fn stub_factory() -> (impl EngineFactory, StubTrigger) {
    let (engine, trigger) = StubEngine::new();
    let slot = Mutex::new(Some(engine));
    let factory = move |_config: &RecognizerConfig| -> Result<Box<dyn RecognitionEngine>> {
        match slot.lock().take() {
            Some(engine) => Ok(Box::new(engine) as Box<dyn RecognitionEngine>),
            None => Err(BridgeError::Initialization("engine already handed out".into())),
        }
    };
    (factory, trigger)
}

pub fn invocation(name: &str, args: &[&str]) -> (String, Vec<String>) {
    (
        name.to_string(),
        args.iter().map(|a| a.to_string()).collect(),
    )
}

/// Engine that ignores `unsubscribe`, like a vendor callback already in
/// flight when the subscription is dropped.
pub struct LingeringEngine {
    sink: Arc<Mutex<Option<NotificationSink>>>,
}

impl RecognitionEngine for LingeringEngine {
    fn subscribe(&mut self, sink: NotificationSink) {
        *self.sink.lock() = Some(sink);
    }

    fn unsubscribe(&mut self) {}

    fn start_continuous_recognition(&mut self) {}

    fn stop_continuous_recognition(&mut self) {}
}

/// Factory for one `LingeringEngine`, plus the slot its sink lands in.
pub fn lingering_factory() -> (impl EngineFactory, Arc<Mutex<Option<NotificationSink>>>) {
    let sink = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&sink);
    let factory = move |_config: &RecognizerConfig| -> Result<Box<dyn RecognitionEngine>> {
        Ok(Box::new(LingeringEngine {
            sink: Arc::clone(&slot),
        }))
    };
    (factory, sink)
}

//! The cooperative dispatcher loop.
//!
//! One task owns the [`DeviceManager`]; operations run to completion, and
//! between them the loop feeds in queued plugin signals, periodic timer
//! ticks (which also drive transaction expiry), and rule evaluation for
//! triggered events.

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use hearth_domain::time::now;

use crate::event_bus::Notification;
use crate::manager::DeviceManager;
use crate::ports::plugin::PluginSignal;
use crate::ports::settings::SettingsStore;
use crate::rules::RuleEngine;

/// Drive the manager until `shutdown` resolves.
///
/// Wires the event channel into the rule engine: every triggered event is
/// evaluated, and the matching actions are dispatched (reissued under
/// fresh execution ids, so recurring triggers do not collide).
pub async fn run<S: SettingsStore>(
    manager: &mut DeviceManager<S>,
    signals: &mut mpsc::UnboundedReceiver<PluginSignal>,
    rules: &mut RuleEngine,
    shutdown: impl Future<Output = ()>,
) {
    let mut ticker = tokio::time::interval(manager.config().timer_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick of a tokio interval fires immediately; swallow it so
    // the timer contract stays "every interval".
    ticker.tick().await;

    let mut notifications = manager.subscribe();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                debug!("dispatcher shutting down");
                break;
            }
            signal = signals.recv() => {
                match signal {
                    Some(signal) => manager.handle_signal(signal),
                    // All emitters dropped; plugin signals can no longer arrive.
                    None => break,
                }
            }
            _ = ticker.tick() => {
                manager.expire_transactions(now());
                manager.dispatch_timer_tick();
            }
            notification = notifications.recv() => {
                match notification {
                    Ok(Notification::EventTriggered { event }) => {
                        for action in rules.evaluate_trigger(event.event_type_id) {
                            let action = action.reissued();
                            if let Err(err) = manager.execute_action(action) {
                                warn!(%err, "rule action failed");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(err) => warn!(%err, "notification subscription lagged"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use hearth_domain::action::Action;
    use hearth_domain::device::Device;
    use hearth_domain::device_class::{
        ActionType, CreateMethod, DeviceClass, SetupMethod, StateType, Vendor,
    };
    use hearth_domain::error::{Completion, DeviceError, SetupStatus};
    use hearth_domain::id::{
        ActionTypeId, DeviceClassId, DeviceId, EventTypeId, PairingTransactionId, PluginId,
        StateTypeId, VendorId,
    };
    use hearth_domain::params::{Param, ParamKind, ParamType, ParamValue};

    use crate::manager::ManagerConfig;
    use crate::ports::plugin::{DevicePlugin, PluginEmitter};
    use crate::ports::provider::{PluginPackage, PluginProvider};
    use crate::ports::settings::MemorySettings;

    struct LoopPlugin {
        id: PluginId,
        vendor: Vendor,
        class: DeviceClass,
        emitter: Arc<Mutex<Option<PluginEmitter>>>,
        actions: Arc<Mutex<Vec<Action>>>,
    }

    impl DevicePlugin for LoopPlugin {
        fn plugin_id(&self) -> PluginId {
            self.id
        }
        fn plugin_name(&self) -> &str {
            "loop"
        }
        fn supported_vendors(&self) -> Vec<Vendor> {
            vec![self.vendor.clone()]
        }
        fn supported_devices(&self) -> Vec<DeviceClass> {
            vec![self.class.clone()]
        }
        fn init(&mut self, emitter: PluginEmitter) {
            *self.emitter.lock().unwrap() = Some(emitter);
        }
        fn setup_device(&mut self, _device: &Device) -> SetupStatus {
            SetupStatus::Success
        }
        fn confirm_pairing(
            &mut self,
            _transaction_id: PairingTransactionId,
            _device_class_id: DeviceClassId,
            _params: &[Param],
        ) -> SetupStatus {
            SetupStatus::Success
        }
        fn execute_action(
            &mut self,
            _device: &Device,
            action: &Action,
        ) -> Result<Completion, DeviceError> {
            self.actions.lock().unwrap().push(action.clone());
            Ok(Completion::Done)
        }
    }

    struct OneShotProvider(Option<PluginPackage>);

    impl PluginProvider for OneShotProvider {
        fn load(&mut self) -> Vec<PluginPackage> {
            self.0.take().into_iter().collect()
        }
    }

    #[tokio::test]
    async fn should_fire_rule_action_when_state_change_event_triggers() {
        let plugin_id = PluginId::new();
        let vendor = Vendor::new(VendorId::new(), "Acme");
        let state_type_id = StateTypeId::new();
        let toggle_action_id = ActionTypeId::new();
        let class = DeviceClass::builder(DeviceClassId::new(), vendor.id, plugin_id)
            .name("Lamp")
            .create_method(CreateMethod::User)
            .setup_method(SetupMethod::JustAdd)
            .param_type(ParamType::new("host", ParamKind::String))
            .state_type(StateType::new(state_type_id, "power", ParamValue::Bool(false)))
            .action_type(ActionType::new(toggle_action_id, "toggle", vec![]))
            .build();

        let emitter = Arc::new(Mutex::new(None));
        let actions = Arc::new(Mutex::new(Vec::new()));
        let plugin = LoopPlugin {
            id: plugin_id,
            vendor: vendor.clone(),
            class: class.clone(),
            emitter: Arc::clone(&emitter),
            actions: Arc::clone(&actions),
        };

        let (mut manager, mut signals) = DeviceManager::new(
            ManagerConfig {
                timer_interval: Duration::from_millis(50),
                ..ManagerConfig::default()
            },
            MemorySettings::new(),
        );
        let mut provider = OneShotProvider(Some(PluginPackage {
            metadata: serde_json::json!({
                "name": "loop",
                "id": plugin_id.to_string(),
                "vendors": [],
            }),
            plugin: Box::new(plugin),
        }));
        manager.register_plugins(&mut provider);

        let device_id = DeviceId::new();
        manager
            .add_configured_device(
                class.id,
                vec![Param::new("host", ParamValue::String("h".into()))],
                Some(device_id),
            )
            .unwrap();

        // Rule: when the power state changes, run the toggle action.
        let mut rules = RuleEngine::new();
        rules
            .add_rule(
                EventTypeId::from(state_type_id),
                Action::new(device_id, toggle_action_id, vec![]),
                manager.catalog(),
            )
            .unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let emitter = emitter.lock().unwrap().clone().unwrap();
        let driver = async move {
            run(&mut manager, &mut signals, &mut rules, async {
                let _ = stop_rx.await;
            })
            .await;
        };

        let stimulus = async move {
            emitter.state_value_changed(device_id, state_type_id, ParamValue::Bool(true));
            // Give the loop time to process the signal and the event.
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = stop_tx.send(());
        };

        tokio::join!(driver, stimulus);

        let executed = actions.lock().unwrap();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].action_type_id, toggle_action_id);
        assert_eq!(executed[0].device_id, device_id);
    }
}

//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to               |
//! |----------------|--------------------|---------------------------|
//! | `log_sink`     | EventSink          | `log` facade              |
//! | `memory_store` | StoragePort        | in-memory map             |
//! | `param_store`  | ConfigPort         | any StoragePort (postcard)|
//! | `sim_plant`    | SensorPort         | first-order plate model   |
//! |                | ActuatorPort       |                           |
//! | `time`         | ClockPort          | `Instant` / manual clock  |

pub mod log_sink;
pub mod memory_store;
pub mod param_store;
pub mod sim_plant;
pub mod time;

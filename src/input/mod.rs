// Input - Panel decoding and parameter-lock mapping

pub mod console;
pub mod debounce;
pub mod mapper;
pub mod rotary;

pub use debounce::{Debouncer, PanelScanner, PanelSwitch};
pub use mapper::{Action, InputEvent, InputMapper, Rotary};
pub use rotary::{Gearbox, QuadratureDecoder};

// Purpose - getting rendered audio out: a live device stream or a WAV file

pub mod output;
pub mod wav;

pub use output::OutputStream;
pub use wav::{render_offline, write_wav, OfflineRender};

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub(crate) use self::unix::*;
    } else {
        compile_error!("wasi-compat doesn't compile for this platform yet");
    }
}

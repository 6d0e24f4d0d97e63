use std::str::FromStr;
use anyhow::Result;

pub fn opt<T: FromStr>(arg: Option<&str>) -> Result<Option<T>> {
    arg.map(parse).transpose()
}

pub fn many<T: FromStr>(args: Option<clap::Values<'_>>) -> Result<Vec<T>> {
    args.into_iter().flatten().map(parse).collect()
}

fn parse<T: FromStr>(arg: &str) -> Result<T> {
    Ok(T::from_str(arg).map_err(|_| {
        let msg  = format!("invalid argument value '{}'", arg);
        let kind = clap::ErrorKind::InvalidValue;
        clap::Error::with_description(&msg, kind)
    })?)
}

#[derive(Debug, PartialEq)]
pub struct Config {
    /// Image paths in the order they should be loaded. Later images
    /// overwrite earlier ones on overlapping addresses.
    pub images: Vec<String>,
}

impl Config {
    pub fn with(args: &[String]) -> Result<Self, &'static str> {
        if args.len() < 2 {
            return Err("not enough arguments");
        }

        Ok(Self {
            images: args[1..].to_vec(),
        })
    }
}

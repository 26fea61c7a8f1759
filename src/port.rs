use std::fs;
use std::io::Result;

#[derive(Debug)]
pub struct Port {
    name: String,
    text: Vec<char>,
    pos: usize,
}

impl Port {
    pub fn open_input_file(fname: &str) -> Result<Self> {
        let text = fs::read_to_string(fname)?;
        Ok(Port::from_string(fname, &text))
    }

    pub fn from_string(name: &str, text: &str) -> Self {
        Port {
            name: name.to_string(),
            text: text.chars().collect(),
            pos: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Iterator for Port {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        let c = *self.text.get(self.pos)?;
        self.pos += 1;
        Some(c)
    }
}

#[cfg(test)]
mod test {
    use std::env;
    use std::fs;

    use super::Port;

    #[test]
    fn test_from_string() {
        let port = Port::from_string("<input>", "(a b)");
        assert_eq!(port.name(), "<input>");
        assert_eq!(port.collect::<String>(), "(a b)");
    }

    #[test]
    fn test_open_input_file() {
        let path = env::temp_dir().join("lithp-port-test.scm");
        fs::write(&path, "(define x 1)\n").unwrap();
        let port = Port::open_input_file(path.to_str().unwrap()).unwrap();
        assert_eq!(port.collect::<String>(), "(define x 1)\n");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        assert!(Port::open_input_file("/nonexistent/lithp/file.scm").is_err());
    }
}

use log::{error, info};
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::MftImage;
use crate::mft::{Attribute, MftRecord};

const HELP_TEXT: &str = "     Available Commands:
help
└────── Display the help menu
tree [path]
└────── Display the file structure at the given path and below ('tree' alone starts at the root)
ls [path]
└────── View the contents of a directory
find <name>
└────── Find the full paths of files whose name contains <name>
cat <entry>
└────── View the decoded MFT entry with the given entry number
carve <entry>
└────── Carve the contents of resident files; report the extents needed to carve non-resident files
hexdump <entry>
└────── Print the raw bytes of an MFT entry
clear
└────── Clear the screen
exit
└────── Exit the shell
";

/// Interactive query session over a carved image. Holds the immutable
/// record list and tree; never constructs new records.
pub struct Shell<'a> {
    image: &'a MftImage,
    output_dir: PathBuf,
}

impl<'a> Shell<'a> {
    pub fn new(image: &'a MftImage, output_dir: PathBuf) -> Self {
        Shell { image, output_dir }
    }

    /// Read one command per line until `exit` or end of input.
    pub fn run(&self) {
        println!("Welcome to the MFT shell. Type 'help' for more info, 'exit' to quit.\n");
        if self.image.tree.is_empty() {
            println!("No $FILE_NAME attributes were found; tree, ls and find will have nothing to show.\n");
        }
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            print!("mft> ");
            let _ = io::stdout().flush();
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break, // EOF
                Ok(_) => {}
                Err(e) => {
                    error!("could not read from stdin: {}", e);
                    break;
                }
            }
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if input.eq_ignore_ascii_case("exit") {
                println!("Exiting...");
                break;
            }
            print!("{}", self.execute(input));
        }
    }

    /// Dispatch one command line and return its output. Errors are local:
    /// the session always continues.
    pub fn execute(&self, input: &str) -> String {
        let (command, argument) = match input.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (input, ""),
        };
        match command.to_lowercase().as_str() {
            "help" => HELP_TEXT.to_string(),
            "tree" => self.cmd_tree(argument),
            "ls" => self.cmd_ls(argument),
            "find" => self.cmd_find(argument),
            "cat" => self.cmd_cat(argument),
            "carve" | "dump" => self.cmd_carve(argument),
            "hexdump" => self.cmd_hexdump(argument),
            "clear" => "\x1B[2J\x1B[1;1H".to_string(),
            other => format!("Unknown command: {}\n", other),
        }
    }

    fn cmd_tree(&self, target: &str) -> String {
        let Some(entry) = self.image.tree.resolve(target) else {
            return format!("Folder '{}' not found.\n", target);
        };
        let mut out = String::from(".\n");
        let mut seen_paths = HashSet::new();
        let mut ancestors = Vec::new();
        self.render_subtree(entry, "", "", &mut seen_paths, &mut ancestors, &mut out);
        out
    }

    fn render_subtree(
        &self,
        entry: u64,
        indent: &str,
        path: &str,
        seen_paths: &mut HashSet<String>,
        ancestors: &mut Vec<u64>,
        out: &mut String,
    ) {
        let Some(children) = self.image.tree.children(entry) else {
            return;
        };
        ancestors.push(entry);
        let count = children.len();
        for (i, (name, child)) in children.iter().enumerate() {
            let child_path = format!("{}/{}", path, name);
            if !seen_paths.insert(child_path.clone()) {
                continue;
            }
            let branch = if i + 1 == count { "`--" } else { "|--" };
            if self.image.tree.is_directory(*child) {
                out.push_str(&format!("{}{}{}/  (entry {})\n", indent, branch, name, child));
                if ancestors.contains(child) {
                    out.push_str(&format!("{}    [cycle back to entry {}]\n", indent, child));
                    continue;
                }
                let deeper = format!("{}{}", indent, if i + 1 == count { "   " } else { "|  " });
                self.render_subtree(*child, &deeper, &child_path, seen_paths, ancestors, out);
            } else {
                out.push_str(&format!("{}{}{}  (entry {})\n", indent, branch, name, child));
            }
        }
        ancestors.pop();
    }

    fn cmd_ls(&self, target: &str) -> String {
        let Some(entry) = self.image.tree.resolve(target) else {
            return format!("Folder '{}' not found.\n", target);
        };
        let Some(children) = self.image.tree.children(entry) else {
            return format!("Entry {} has no children.\n", entry);
        };
        // One line per child entry number, first-seen name wins.
        let mut seen = HashSet::new();
        let mut out = String::new();
        for (name, child) in children {
            if !seen.insert(*child) {
                continue;
            }
            if self.image.tree.is_directory(*child) {
                out.push_str(&format!("{}/  (entry {})\n", name, child));
            } else {
                out.push_str(&format!("{}  (entry {})\n", name, child));
            }
        }
        out
    }

    fn cmd_find(&self, pattern: &str) -> String {
        if pattern.is_empty() {
            return "Please specify a file name to find.\n".to_string();
        }
        let paths = self.image.tree.find(pattern);
        if paths.is_empty() {
            return format!("No entry matching '{}' was found.\n", pattern);
        }
        let mut out = String::new();
        for path in paths {
            out.push_str(&path);
            out.push('\n');
        }
        out
    }

    fn cmd_cat(&self, argument: &str) -> String {
        let record = match self.lookup(argument) {
            Ok(r) => r,
            Err(msg) => return msg,
        };
        let name = record.primary_name().unwrap_or_else(|| "<unnamed>".into());
        format!(
            "Showing MFT entry {} for file: {}\n{}",
            record.header.entry_number,
            name,
            record.to_string()
        )
    }

    fn cmd_carve(&self, argument: &str) -> String {
        let record = match self.lookup(argument) {
            Ok(r) => r,
            Err(msg) => return msg,
        };
        let name = record
            .primary_name()
            .unwrap_or_else(|| format!("entry_{}.bin", record.header.entry_number));

        match record.data_attribute() {
            Some(Attribute::Resident { value, .. }) => {
                let path = self.output_dir.join(&name);
                match fs::write(&path, &value) {
                    Ok(()) => {
                        info!("carved {} bytes from entry {}", value.len(), record.header.entry_number);
                        format!(
                            "Data was successfully dumped to '{}'.\n└────── File Size: {} bytes\n\nContent:\n---------------------------------------------------\n{}\n",
                            path.display(),
                            value.len(),
                            String::from_utf8_lossy(&value)
                        )
                    }
                    Err(e) => format!("Could not write '{}': {}\n", path.display(), e),
                }
            }
            Some(Attribute::NonResident {
                non_resident, runs, ..
            }) => {
                let mut out = format!(
                    "Note that this file is non-resident and its content cannot be produced from the $MFT alone.\n\n  Statistics for {}\n└────── Starting Cluster: {}\n└────── Ending Cluster: {}\n└────── Datarun Offset: {}\n└────── File Size to Carve: {} bytes\n",
                    name,
                    non_resident.start_vcn,
                    non_resident.end_vcn,
                    non_resident.run_list_offset,
                    non_resident.real_size
                );
                for run in &runs {
                    if run.sparse {
                        out.push_str(&format!(
                            "└────── Run: {} clusters, sparse\n",
                            run.length_clusters
                        ));
                    } else {
                        out.push_str(&format!(
                            "└────── Run: {} clusters starting at cluster {}\n",
                            run.length_clusters, run.start_cluster
                        ));
                    }
                }
                out
            }
            Some(Attribute::Unrecognized { .. }) | None => format!(
                "Entry {} has no $DATA attribute to carve.\n",
                record.header.entry_number
            ),
        }
    }

    fn cmd_hexdump(&self, argument: &str) -> String {
        match self.lookup(argument) {
            Ok(record) => hexdump(&record.raw),
            Err(msg) => msg,
        }
    }

    fn lookup(&self, argument: &str) -> Result<&MftRecord, String> {
        if argument.is_empty() {
            return Err("Please enter an MFT entry number.\n".to_string());
        }
        let entry: u64 = argument
            .parse()
            .map_err(|_| format!("Invalid MFT entry number: '{}'\n", argument))?;
        self.image
            .record_by_entry(entry)
            .ok_or_else(|| format!("No MFT entry with number {}.\n", entry))
    }
}

/// Classic offset / hex / ASCII dump, 16 bytes per row.
pub fn hexdump(raw: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in raw.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| {
                if (0x20..0x7F).contains(&b) {
                    b as char
                } else {
                    '.'
                }
            })
            .collect();
        out.push_str(&format!(
            "{:08x}  {:<47}  |{}|\n",
            i * 16,
            hex.join(" "),
            ascii
        ));
    }
    out
}

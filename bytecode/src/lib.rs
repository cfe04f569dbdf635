mod op;
mod instruction;
mod builder;
mod decoder;
mod line_table;

pub use op::Op;
pub use instruction::{Capture, Instruction};
pub use builder::{BytecodeBuilder, JumpOutOfRange, Label};
pub use decoder::{BytecodeDecoder, DecodeError};
pub use line_table::{LineTable, LineTableBuilder};

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Instruction> {
        BytecodeDecoder::new(bytes).map(|r| r.unwrap()).collect()
    }

    #[test]
    fn opcode_table_matches_discriminants() {
        for (i, op) in op::ALL_OPS.iter().enumerate() {
            assert_eq!(*op as u8 as usize, i, "{op:?} out of order");
            assert_eq!(Op::from_u8(i as u8), Some(*op));
        }
        assert_eq!(Op::from_u8(op::ALL_OPS.len() as u8), None);
        assert_eq!(Op::try_from(0xFF), Err(0xFF));
    }

    #[test]
    fn operands_round_trip() {
        let mut b = BytecodeBuilder::new();
        b.constant(300);
        b.get_local(7);
        b.set_local(9);
        b.get_global(1);
        b.define_global(2);
        b.set_global(3);
        b.get_upvalue(4);
        b.set_upvalue(5);
        b.call(2);
        b.struct_def(3, 11);
        b.struct_field(12);
        b.get_field(13);
        b.set_field(14);
        b.array(6);
        b.method(15);
        b.invoke(16, 1);
        b.import(17);
        b.inc_local(1);
        b.add_local_const(2, 18);
        b.less_local_const(3, 19);
        b.index_get_local(4);
        b.emit(Op::Return);

        assert_eq!(decode_all(b.as_bytes()), vec![
            Instruction::Constant { idx: 300 },
            Instruction::GetLocal { slot: 7 },
            Instruction::SetLocal { slot: 9 },
            Instruction::GetGlobal { name: 1 },
            Instruction::DefineGlobal { name: 2 },
            Instruction::SetGlobal { name: 3 },
            Instruction::GetUpvalue { index: 4 },
            Instruction::SetUpvalue { index: 5 },
            Instruction::Call { argc: 2 },
            Instruction::StructDef { fields: 3, name: 11 },
            Instruction::StructField { name: 12 },
            Instruction::GetField { name: 13 },
            Instruction::SetField { name: 14 },
            Instruction::Array { count: 6 },
            Instruction::Method { name: 15 },
            Instruction::Invoke { name: 16, argc: 1 },
            Instruction::Import { path: 17 },
            Instruction::IncLocal { slot: 1 },
            Instruction::AddLocalConst { slot: 2, constant: 18 },
            Instruction::LessLocalConst { slot: 3, constant: 19 },
            Instruction::IndexGetLocal { slot: 4 },
            Instruction::Return,
        ]);
    }

    #[test]
    fn short_local_forms() {
        let mut b = BytecodeBuilder::new();
        for slot in 0..5 {
            b.get_local(slot);
        }
        assert_eq!(decode_all(b.as_bytes()), vec![
            Instruction::GetLocal0,
            Instruction::GetLocal1,
            Instruction::GetLocal2,
            Instruction::GetLocal3,
            Instruction::GetLocal { slot: 4 },
        ]);
        assert_eq!(b.current_offset(), 6);
    }

    #[test]
    fn forward_jump() {
        let mut b = BytecodeBuilder::new();
        b.emit(Op::True);
        let label = b.jump_if_false();
        b.constant(1);
        b.bind(label).unwrap();
        b.emit(Op::Return);

        assert_eq!(decode_all(b.as_bytes()), vec![
            Instruction::True,
            Instruction::JumpIfFalse { offset: 3 },
            Instruction::Constant { idx: 1 },
            Instruction::Return,
        ]);
    }

    #[test]
    fn backward_jump() {
        let mut b = BytecodeBuilder::new();
        let loop_top = b.current_offset();
        b.get_local(5);
        b.loop_to(loop_top).unwrap();

        assert_eq!(decode_all(b.as_bytes()), vec![
            Instruction::GetLocal { slot: 5 },
            Instruction::Loop { offset: 5 },
        ]);
    }

    #[test]
    fn jump_out_of_range() {
        let mut b = BytecodeBuilder::new();
        let label = b.jump();
        for _ in 0..(u16::MAX as usize + 1) {
            b.emit(Op::Nil);
        }
        assert!(matches!(b.bind(label), Err(JumpOutOfRange { distance: 65536 })));
    }

    #[test]
    fn closure_captures() {
        let mut b = BytecodeBuilder::new();
        b.closure(2, &[Capture::Local(1), Capture::Upvalue(0)]);
        b.emit(Op::Pop);

        let bytes = b.into_bytes();
        let mut decoder = BytecodeDecoder::new(&bytes);
        assert_eq!(
            decoder.decode_next(),
            Some(Ok(Instruction::Closure { function: 2, captures: 2 }))
        );
        assert_eq!(decoder.read_capture(), Ok(Capture::Local(1)));
        assert_eq!(decoder.read_capture(), Ok(Capture::Upvalue(0)));
        assert_eq!(decoder.decode_next(), Some(Ok(Instruction::Pop)));
        assert_eq!(decoder.decode_next(), None);

        // the iterator skips the descriptors on its own
        assert_eq!(decode_all(&bytes), vec![
            Instruction::Closure { function: 2, captures: 2 },
            Instruction::Pop,
        ]);
    }

    #[test]
    fn malformed_streams() {
        let mut decoder = BytecodeDecoder::new(&[0xF0]);
        assert_eq!(decoder.decode_next(), Some(Err(DecodeError::UnknownOpcode(0xF0))));

        let bytes = [Op::Nil as u8, Op::Constant as u8, 1];
        let results: Vec<_> = BytecodeDecoder::new(&bytes).collect();
        assert_eq!(results, vec![
            Ok(Instruction::Nil),
            Err(DecodeError::Truncated { offset: 1 }),
        ]);
    }

    #[test]
    fn lines_follow_set_line() {
        let mut b = BytecodeBuilder::new();
        b.set_line(3);
        b.emit(Op::Nil);
        b.constant(0);
        b.set_line(4);
        b.emit(Op::Return);
        let (bytes, lines) = b.finish();

        assert_eq!(bytes.len(), 5);
        assert_eq!(lines.line_for(0), Some(3));
        assert_eq!(lines.line_for(3), Some(3));
        assert_eq!(lines.line_for(4), Some(4));
    }

    #[test]
    fn display_instructions() {
        assert_eq!(Instruction::Constant { idx: 5 }.to_string(), "Constant #5");
        assert_eq!(Instruction::Loop { offset: 7 }.to_string(), "Loop -7");
        assert_eq!(
            Instruction::Invoke { name: 2, argc: 1 }.to_string(),
            "Invoke #2 1"
        );
        assert_eq!(Instruction::AddInt.to_string(), "AddInt");
        assert_eq!(Capture::Local(3).to_string(), "local 3");
    }
}
